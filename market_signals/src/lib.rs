//! Signals computed alongside the risk pipeline but never consulted by it:
//! text sentiment over news and social posts, and the input/output
//! contract of the next-close sequence predictor.

pub mod forecast;
pub mod news;
pub mod sentiment;
