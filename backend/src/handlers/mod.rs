pub mod trending;


pub use trending::configure_trending_routes;
