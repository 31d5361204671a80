mod tools;

pub use tools::RepositoryTools;
