mod postgres;
mod rates;

pub use postgres::PostgresClient;
pub use rates::ExchangeRateClient;
