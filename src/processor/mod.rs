pub mod detection_processor;
