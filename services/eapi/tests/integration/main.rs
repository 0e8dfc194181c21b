mod helpers;

mod authenticate_test;
mod forward_test;
mod token_test;
