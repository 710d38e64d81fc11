/// CSV export of chart series.
pub mod export;
