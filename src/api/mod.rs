pub mod event;
pub mod review;
pub mod statistic;
pub mod transaction;
pub mod user;

pub use self::{
    event::Event, review::Review, transaction::Transaction, user::User,
};
