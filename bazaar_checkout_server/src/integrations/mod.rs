pub mod ezpay;
pub mod shipquick;
