mod body;
mod engine;
mod routes;
mod waf;
