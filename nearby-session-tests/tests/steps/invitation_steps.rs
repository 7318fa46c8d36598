use cucumber::{then, when};
use nearby_session_tests::RosterWorld;

#[when(expr = "{string} invites the local peer")]
async fn remote_invites(world: &mut RosterWorld, name: String) {
    if !world.remotes.contains_key(&name) {
        world.add_remote(&name);
    }
    world.remote_invites(&name);
    world.turn();
}

#[when(expr = "the local peer accepts the invitation from {string}")]
async fn local_accepts(world: &mut RosterWorld, name: String) {
    let invitation = world
        .observer
        .invitation_from(&name)
        .unwrap_or_else(|| panic!("No invitation from '{}'", name));
    world.local.accept(&invitation).unwrap();
    world.turn();
}

#[when(expr = "the local peer rejects the invitation from {string}")]
async fn local_rejects(world: &mut RosterWorld, name: String) {
    let invitation = world
        .observer
        .invitation_from(&name)
        .unwrap_or_else(|| panic!("No invitation from '{}'", name));
    world.local.reject(&invitation).unwrap();
    world.turn();
}

#[when("the local peer stops advertising")]
async fn local_stops_advertising(world: &mut RosterWorld) {
    world.local.stop_advertising();
}

#[then(expr = "the local peer was asked about an invitation from {string}")]
async fn asked_about(world: &mut RosterWorld, name: String) {
    let invitation = world.observer.invitation_from(&name);
    assert!(invitation.is_some(), "no invitation from '{}'", name);
}

#[then(expr = "the local peer was never asked about {string}")]
async fn never_asked(world: &mut RosterWorld, name: String) {
    assert!(world.observer.invitation_from(&name).is_none());
}

#[then(expr = "the invitation from {string} can not be answered twice")]
async fn answered_once(world: &mut RosterWorld, name: String) {
    let invitation = world
        .observer
        .invitation_from(&name)
        .unwrap_or_else(|| panic!("No invitation from '{}'", name));
    assert!(invitation.is_resolved());
    assert!(world.local.accept(&invitation).is_err());
}

#[then("no invitations are pending")]
async fn nothing_pending(world: &mut RosterWorld) {
    assert!(world.local.pending_invitations().is_empty());
}
