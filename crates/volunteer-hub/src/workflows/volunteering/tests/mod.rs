mod common;
mod routing;
mod sweeper;
