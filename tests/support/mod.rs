#![allow(dead_code)]
#![allow(unused_imports)]

mod harness;
mod http_client;
mod net;
mod readers;

pub use harness::*;
pub use http_client::*;
pub use net::*;
pub use readers::*;
