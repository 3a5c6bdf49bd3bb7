mod digest;
mod start;

use crate::{Data, Error};
use digest::digest;
use start::start;

pub use start::handle_component;

pub fn commands() -> Vec<poise::Command<Data, Error>> {
    vec![start(), digest()]
}
