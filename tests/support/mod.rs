#![allow(dead_code)]

pub mod gcp_fixture;
