mod common;
mod routing;
