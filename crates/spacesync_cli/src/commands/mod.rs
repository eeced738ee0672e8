pub(crate) mod config;
pub(crate) mod meta;
pub(crate) mod output;
pub(crate) mod plan;
pub(crate) mod slug;
