mod capture;
mod detect;
mod support;
