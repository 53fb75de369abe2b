pub mod bar;
pub mod period;
pub mod request_params;
pub mod timeframe;
