//! End-to-end tests across the store, admission engine, and services.

mod helpers;

mod admin_test;
mod admission_test;
mod store_test;
mod sweep_test;
