use cucumber::{gherkin::Step, given, then, when};
use nearby_session_p2p::{DiscoveryKind, PeerState, Reliability, SessionError, Transport};
use nearby_session_tests::{RosterWorld, SERVICE_TYPE};

fn parse_state(state: &str) -> PeerState {
    match state {
        "not connected" => PeerState::NotConnected,
        "connecting" => PeerState::Connecting,
        "connected" => PeerState::Connected,
        other => panic!("Unknown peer state '{}'", other),
    }
}

fn add_table_peers(world: &mut RosterWorld, step: &Step) {
    world.observer.reset();
    let table = step.table.as_ref().expect("a table of peer names");
    for row in &table.rows {
        world.add_remote(&row[0]);
    }
    world.turn();
}

// ===== Given Steps =====

#[given("the local peer is browsing and advertising")]
async fn local_peer_started(world: &mut RosterWorld) {
    world.local.start_services().unwrap();
    assert!(world.local.is_browsing());
    assert!(world.local.is_advertising());
}

#[given(expr = "a peer {string} is nearby")]
async fn peer_nearby(world: &mut RosterWorld, name: String) {
    world.add_remote(&name);
    world.turn();
}

#[given(expr = "{string} is connected")]
async fn peer_is_connected(world: &mut RosterWorld, name: String) {
    world.connect(&name);
    assert_eq!(world.state_of(&name), Some(PeerState::Connected));
}

// ===== When Steps =====

#[when(expr = "a peer {string} appears nearby")]
async fn peer_appears(world: &mut RosterWorld, name: String) {
    world.add_remote(&name);
    world.turn();
}

#[when("these peers appear at the same time:")]
async fn peers_appear_together(world: &mut RosterWorld, step: &Step) {
    add_table_peers(world, step);
}

#[when(expr = "the local peer invites {string}")]
async fn local_invites(world: &mut RosterWorld, name: String) {
    let peer = world.identity(&name);
    world.local.invite(&peer, Vec::new()).unwrap();
}

#[when(expr = "{string} accepts the invitation")]
async fn remote_accepts(world: &mut RosterWorld, name: String) {
    assert_eq!(world.remote_answers(&name, true), 1);
    world.turn();
}

#[when(expr = "{string} declines the invitation")]
async fn remote_declines(world: &mut RosterWorld, name: String) {
    assert_eq!(world.remote_answers(&name, false), 1);
    world.turn();
}

#[when(expr = "the handshake with {string} completes")]
async fn handshake_completes(world: &mut RosterWorld, name: String) {
    assert!(world.complete_handshake(&name));
}

#[when(expr = "the connection to {string} drops")]
async fn connection_drops(world: &mut RosterWorld, name: String) {
    let local = world.local.local_identity().id();
    world.network.sever(&local, &world.identity(&name).id());
    world.turn();
}

#[when(expr = "discovery loses sight of {string}")]
async fn discovery_loses(world: &mut RosterWorld, name: String) {
    let local = world.local.local_identity().id();
    world.network.lose_sight(&local, &world.identity(&name).id());
    world.turn();
}

#[when(expr = "{string} is found again")]
async fn found_again(world: &mut RosterWorld, name: String) {
    world.observer.reset();
    // Advertising again announces the same identity to every browser
    world.remote(&name).start_advertising(SERVICE_TYPE).unwrap();
    world.turn();
}

#[when(expr = "the local peer sends {string} to {string}")]
async fn local_sends(world: &mut RosterWorld, message: String, name: String) {
    let peer = world.identity(&name);
    world.last_error = world
        .local
        .send(&peer.id(), message.into_bytes(), Reliability::Reliable)
        .await
        .err();
}

#[when("the local peer stops its services")]
async fn local_stops(world: &mut RosterWorld) {
    world.local.stop_services().unwrap();
}

#[when("the local peer shuts down")]
async fn local_shuts_down(world: &mut RosterWorld) {
    world.local.shutdown();
}

#[when(expr = "the local browser fails with {string}")]
async fn browser_fails(world: &mut RosterWorld, reason: String) {
    let local = world.local.local_identity().id();
    world
        .network
        .fail_discovery(&local, DiscoveryKind::Browser, &reason);
    world.turn();
}

// ===== Then Steps =====

#[then(regex = r#"^the roster shows "([^"]+)" as (not connected|connecting|connected)$"#)]
async fn roster_shows(world: &mut RosterWorld, name: String, state: String) {
    assert_eq!(world.state_of(&name), Some(parse_state(&state)));
}

#[then(expr = "{string} appears in exactly one roster section")]
async fn one_section(world: &mut RosterWorld, name: String) {
    assert_eq!(world.sections_containing(&name), 1);
}

#[then(expr = "{string} is not in the roster")]
async fn not_in_roster(world: &mut RosterWorld, name: String) {
    assert_eq!(world.sections_containing(&name), 0);
}

#[then(expr = "{string} is neither connecting nor connected")]
async fn not_joined(world: &mut RosterWorld, name: String) {
    let state = world.state_of(&name);
    assert_ne!(state, Some(PeerState::Connecting));
    assert_ne!(state, Some(PeerState::Connected));
}

#[then(expr = "the roster holds {int} peer(s)")]
async fn roster_size(world: &mut RosterWorld, count: usize) {
    assert_eq!(world.local.roster().len(), count);
}

#[then(expr = "the observer was notified {int} time(s)")]
async fn observer_notified(world: &mut RosterWorld, count: usize) {
    assert_eq!(world.observer.roster_changes(), count);
}

#[then("the send fails because the peer is not connected")]
async fn send_not_connected(world: &mut RosterWorld) {
    assert!(matches!(
        world.last_error,
        Some(SessionError::PeerNotConnected(_))
    ));
}

#[then("the local peer is neither browsing nor advertising")]
async fn local_idle(world: &mut RosterWorld) {
    assert!(!world.local.is_browsing());
    assert!(!world.local.is_advertising());
}

#[then("the local browser has stopped")]
async fn browser_stopped(world: &mut RosterWorld) {
    assert!(!world.local.is_browsing());
    assert_eq!(world.observer.failures(), vec![DiscoveryKind::Browser]);
}

#[then("the local advertiser is still running")]
async fn advertiser_running(world: &mut RosterWorld) {
    assert!(world.local.is_advertising());
}
