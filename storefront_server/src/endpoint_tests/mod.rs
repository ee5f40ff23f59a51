mod helpers;
mod orders;
mod payments;
