//! Steps for relay behavioural tests.
use cucumber::{given, then, when};

use crate::worlds::relay::{RelayWorld, TestResult};

#[given("a relay endpoint admitting only odd connection ids")]
fn given_endpoint(world: &mut RelayWorld) { world.start(); }

#[when("three clients connect")]
async fn when_clients_connect(world: &mut RelayWorld) -> TestResult { world.connect(3).await }

#[then("clients 1 and 3 are admitted and client 2 is refused")]
fn then_odd_admitted(world: &mut RelayWorld) -> TestResult { world.verify_admitted(&[1, 3], &[2]) }

#[when(expr = "client {int} sends {string}")]
fn when_client_sends(world: &mut RelayWorld, id: u64, text: String) -> TestResult {
    world.send(id, &text)
}

#[then(expr = "client {int} receives {string}")]
async fn then_client_receives(world: &mut RelayWorld, id: u64, text: String) -> TestResult {
    world.expect_text(id, &text).await
}

#[when("client 3 closes and then client 1 closes")]
async fn when_clients_close(world: &mut RelayWorld) -> TestResult {
    world.close_in_order(&[3, 1]).await
}

#[then("close notifications arrive for 3 then 1")]
fn then_close_order(world: &mut RelayWorld) { world.verify_close_order(&[3, 1]); }

#[then(expr = "client {int} received no relayed messages")]
async fn then_nothing_relayed(world: &mut RelayWorld, id: u64) -> TestResult {
    world.verify_nothing_relayed(id).await
}

#[when("the endpoint shuts down")]
async fn when_shutdown(world: &mut RelayWorld) -> TestResult { world.shutdown().await }

#[then(expr = "clients 1 and 3 receive close status {int}")]
async fn then_close_status(world: &mut RelayWorld, status: u16) -> TestResult {
    world.verify_close_status(&[1, 3], status).await
}
