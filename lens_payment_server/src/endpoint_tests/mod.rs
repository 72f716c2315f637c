mod helpers;
mod mocks;
mod payments;
mod plans;
mod subscriptions;
