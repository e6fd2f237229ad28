pub mod create;
pub mod delete;
pub mod generate;
pub mod get;
pub mod grant;
pub mod id;
pub mod import;
pub mod init;
pub mod list;
pub mod transfer;
pub mod version;

pub use create::Create;
pub use delete::Delete;
pub use generate::Generate;
pub use get::Get;
pub use grant::Grant;
pub use id::Id;
pub use import::Import;
pub use init::Init;
pub use list::List;
pub use transfer::Transfer;
pub use version::Version;
