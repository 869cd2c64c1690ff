//! HTTP request / response types, all serialized with camelCase field names.

pub mod api;
