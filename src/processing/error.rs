use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] crate::client::Error),

    #[error("invalid client payload: {0}")]
    InvalidPayload(Cow<'static, str>),
}
