extern crate whiteboard_system as system;

use system::euclid::default::Point2D;
use system::{
    bincode, CanvasSnapshot, ClientReplica, Color, DrawCommand, IdentifiableEvent, Identity,
    ReplicaChange, ReplicaEvent, ReplicaState, SessionCommand, ShapeKind,
};

fn over_the_wire(event: ReplicaEvent) -> ReplicaEvent {
    let bytes = bincode::serialize(&IdentifiableEvent::BySystem {
        replica_event: event,
    })
    .expect("");
    match bincode::deserialize::<IdentifiableEvent>(&bytes).expect("") {
        IdentifiableEvent::BySystem { replica_event } => replica_event,
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn it_should_converge_with_a_late_joiner() {
    let mut alice = ClientReplica::new(Identity::new("alice", "pw"));
    alice.enter_session(true, vec![]);

    let line = alice.shape(
        1,
        Color::default(),
        ShapeKind::Line,
        Point2D::new(0.0, 0.0),
        Point2D::new(10.0, 10.0),
    );
    alice.handle_event(over_the_wire(ReplicaEvent::Draw(line.clone())));

    let mut bob = ClientReplica::new(Identity::new("bob", "pw"));
    bob.enter_session(false, alice.log().to_vec());

    alice.begin_stroke(2, Color { r: 0, g: 0, b: 255 }, Point2D::new(1.0, 1.0));
    alice.extend_stroke(Point2D::new(2.0, 2.0));

    let circle = bob.shape(
        3,
        Color::default(),
        ShapeKind::Circle,
        Point2D::new(5.0, 5.0),
        Point2D::new(15.0, 15.0),
    );
    for replica in [&mut alice, &mut bob] {
        assert_eq!(
            replica.handle_event(over_the_wire(ReplicaEvent::Draw(circle.clone()))),
            ReplicaChange::Canvas
        );
    }
    assert_eq!(alice.log(), bob.log());
    assert_eq!(alice.log(), &[line, circle][..]);

    // The pushed draw left the stroke in progress alone.
    alice.extend_stroke(Point2D::new(3.0, 1.0));
    match alice.finish_stroke() {
        Some(DrawCommand::Stroke { points, meta }) => {
            assert_eq!(points.len(), 3);
            assert_eq!(meta.author, "alice");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn it_should_restore_a_saved_canvas_on_every_replica() {
    let mut alice = ClientReplica::new(Identity::new("alice", "pw"));
    alice.enter_session(true, vec![]);
    let saved = vec![
        alice.text(1, Color::default(), Point2D::new(4.0, 4.0), "plan"),
        alice.shape(
            2,
            Color::default(),
            ShapeKind::Rectangle,
            Point2D::new(0.0, 0.0),
            Point2D::new(8.0, 3.0),
        ),
    ];
    let snapshot = CanvasSnapshot::from_commands(&saved).expect("");
    let restored = CanvasSnapshot::from_vec(snapshot.content().to_vec())
        .commands()
        .expect("");

    let mut bob = ClientReplica::new(Identity::new("bob", "pw"));
    bob.enter_session(false, vec![]);
    for replica in [&mut alice, &mut bob] {
        replica.handle_event(ReplicaEvent::Clear);
        for command in &restored {
            replica.handle_event(ReplicaEvent::Draw(command.clone()));
        }
        assert_eq!(replica.log(), &saved[..]);
    }
}

#[test]
fn an_admin_answers_a_join_and_a_kicked_member_goes_idle() {
    let mut alice = ClientReplica::new(Identity::new("alice", "pw"));
    alice.enter_session(true, vec![]);
    let ticket = system::uuid::Uuid::new_v4();
    alice.handle_event(ReplicaEvent::ApprovalRequested {
        ticket,
        candidate: Identity::new("bob", "pw"),
    });
    assert_eq!(
        alice.decide(&ticket, true),
        Some(SessionCommand::DecideAdmission {
            ticket,
            approve: true
        })
    );
    assert!(alice.pending_approvals().is_empty());

    let mut bob = ClientReplica::new(Identity::new("bob", "pw"));
    bob.enter_session(false, vec![]);
    bob.handle_event(ReplicaEvent::UserJoined("alice".into()));
    bob.handle_event(ReplicaEvent::UserJoined("bob".into()));
    assert_eq!(bob.handle_event(ReplicaEvent::Reset), ReplicaChange::Reset);
    assert_eq!(bob.state(), ReplicaState::Idle);
    assert!(bob.members().is_empty());
}
