pub mod memory;
pub mod user;

pub use memory::InMemoryUserRepository;
pub use user::{PgUserRepository, RepositoryError, RepositoryResult, UserRepository};
