pub const CREATE_ALERT_HISTORY: &str = r#"
CREATE TABLE IF NOT EXISTS alert_history (
    alert_id         TEXT PRIMARY KEY,
    status           TEXT NOT NULL,
    location         TEXT NOT NULL,
    lat              DOUBLE PRECISION NOT NULL,
    lng              DOUBLE PRECISION NOT NULL,
    source           TEXT NOT NULL,
    confidence_score DOUBLE PRECISION,
    driver           TEXT,
    driver_name      TEXT,
    contact_no       TEXT,
    response_time    TEXT,
    accident_clip    TEXT,
    created_at       TIMESTAMPTZ NOT NULL,
    accepted_at      TIMESTAMPTZ,
    closed_at        TIMESTAMPTZ,
    archived_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

pub const INSERT_ALERT_HISTORY: &str = r#"
INSERT INTO alert_history (
    alert_id,
    status,
    location,
    lat,
    lng,
    source,
    confidence_score,
    driver,
    driver_name,
    contact_no,
    response_time,
    accident_clip,
    created_at,
    accepted_at,
    closed_at
) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
ON CONFLICT (alert_id) DO NOTHING;
"#;
