use std::{net, time};

use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub db: Db,
    pub http: Http,
    pub jwt: Jwt,
    pub transaction: Transaction,
}

#[derive(Deserialize)]
pub struct Db {
    pub url: String,
}

#[derive(Deserialize)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Deserialize)]
pub struct Server {
    pub addr: net::SocketAddr,
}

#[derive(Deserialize)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub secret: String,
    #[serde(with = "humantime_serde")]
    pub expiration_time: time::Duration,
}

#[derive(Deserialize)]
pub struct Transaction {
    /// Time a buyer has to upload a payment proof after a purchase.
    #[serde(with = "humantime_serde")]
    pub payment_window: time::Duration,

    /// Period of the expired transactions sweep.
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub sweep_interval: time::Duration,
}

fn default_sweep_interval() -> time::Duration {
    time::Duration::from_secs(30)
}
