mod administration;
mod common;
mod ranking;
mod routing;
