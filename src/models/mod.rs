pub mod cart;
pub mod category;
pub mod order;
pub mod pagination;
pub mod product;
pub mod review;
pub mod user;
