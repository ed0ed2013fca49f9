pub mod account_service;
pub use account_service::{AccountError, AccountService};

pub mod account_service_impl;
pub use account_service_impl::SeaOrmAccountService;

pub mod movie_service;
pub use movie_service::{MovieError, MovieQuery, MovieService};

pub mod movie_service_impl;
pub use movie_service_impl::SeaOrmMovieService;
