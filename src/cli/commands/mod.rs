mod grant;
mod purge;

pub use grant::cmd_grant;
pub use purge::cmd_purge_tokens;
