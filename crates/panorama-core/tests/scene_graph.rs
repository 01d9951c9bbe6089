use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use panorama_core::error::Entity;
use panorama_core::{AccessGate, BlobStore, Error, FsBlobStore};
use panorama_db::Database;
use panorama_types::api::{FeedbackRequest, LoginRequest, NewSceneRequest, RegisterRequest, Session};
use panorama_types::models::HotspotRatio;
use tempfile::TempDir;

struct Setup {
    _dir: TempDir,
    gate: AccessGate,
    blobs: Arc<FsBlobStore>,
    curator: Session,
    visitor: Session,
}

fn setup() -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open(&dir.path().join("story.db")).unwrap());
    let blobs = Arc::new(FsBlobStore::new(dir.path().join("static")).unwrap());
    let gate = AccessGate::from_stores(db, blobs.clone());

    let register = |name: &str| {
        gate.register(
            &Session::anonymous(),
            &RegisterRequest {
                username: name.into(),
                password: "passw0rd".into(),
            },
        )
        .unwrap()
    };
    register("curator1");
    let curator = gate
        .login(&LoginRequest {
            username: "curator1".into(),
            password: "passw0rd".into(),
        })
        .unwrap();
    let visitor = register("visitor1").session;

    Setup {
        _dir: dir,
        gate,
        blobs,
        curator,
        visitor,
    }
}

fn scene(title: &str, parent_id: Option<i64>, hotspot: Option<(f64, f64)>) -> NewSceneRequest {
    NewSceneRequest {
        title: title.into(),
        scene_type: "panorama".into(),
        parent_id,
        image: Bytes::from(format!("image of {title}")),
        extension: "jpg".into(),
        hotspot: hotspot.map(|(x, y)| HotspotRatio::new(x, y)),
    }
}

fn is_not_found(res: Result<impl std::fmt::Debug, Error>) -> bool {
    matches!(res, Err(Error::NotFound { entity: Entity::Scene, .. }))
}

#[test]
fn deleting_a_root_removes_the_whole_story() {
    let s = setup();
    let graph = s.gate.graph();

    let a = s.gate.publish_scene(&s.curator, &scene("A", None, None)).unwrap();
    let b = s
        .gate
        .publish_scene(&s.curator, &scene("B", Some(a.id), Some((0.3, 0.6))))
        .unwrap();
    let c = s.gate.publish_scene(&s.curator, &scene("C", Some(b.id), None)).unwrap();
    let unrelated = s.gate.publish_scene(&s.curator, &scene("Z", None, None)).unwrap();
    let z_child = s
        .gate
        .publish_scene(&s.curator, &scene("Z1", Some(unrelated.id), Some((0.9, 0.1))))
        .unwrap();

    for (scene_id, text) in [(b.id, "on b"), (c.id, "on c"), (z_child.id, "on z1")] {
        s.gate
            .add_feedback(&s.visitor, &FeedbackRequest { scene_id, message: text.into() })
            .unwrap();
    }

    // Round trip before the delete.
    let children = graph.list_children(a.id).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].scene.name, "B");
    assert_eq!(children[0].hotspot, Some(HotspotRatio::new(0.3, 0.6)));

    let report = s.gate.delete_scene(&s.curator, a.id).unwrap();
    assert_eq!(report.scenes, vec![c.id, b.id, a.id]);
    assert_eq!(report.edges, 1);
    assert_eq!(report.feedback, 2);
    assert_eq!(report.blobs_deleted, 3);

    for id in [a.id, b.id, c.id] {
        assert!(is_not_found(graph.get_scene(id)), "scene {id} survived");
        assert!(s.gate.feedback().list_for_scene(id).unwrap().is_empty());
        assert!(graph.list_children(id).unwrap().is_empty());
    }
    for path in [&a.path, &b.path, &c.path] {
        assert!(!s.blobs.exists(path.as_deref().unwrap()));
    }

    // The other story is untouched.
    let roots = graph.list_roots().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].scene.id, unrelated.id);
    let z_children = graph.list_children(unrelated.id).unwrap();
    assert_eq!(z_children.len(), 1);
    assert_eq!(z_children[0].hotspot, Some(HotspotRatio::new(0.9, 0.1)));
    assert_eq!(s.gate.feedback().list_for_scene(z_child.id).unwrap().len(), 1);
    assert!(s.blobs.exists(z_child.path.as_deref().unwrap()));
}

#[test]
fn parent_chains_always_terminate() {
    let s = setup();
    let mut ids = Vec::new();
    let mut parent = None;
    for depth in 0..30 {
        // Two children per level, only the first continues the chain.
        let first = s
            .gate
            .publish_scene(&s.curator, &scene(&format!("L{depth}a"), parent, None))
            .unwrap();
        let second = s
            .gate
            .publish_scene(&s.curator, &scene(&format!("L{depth}b"), parent, None))
            .unwrap();
        ids.extend([first.id, second.id]);
        parent = Some(first.id);
    }

    let forest = s.gate.graph().forest().unwrap();
    assert_eq!(forest.len(), ids.len());
    assert!(forest.find_cycle().is_none());
    for id in ids {
        let chain = forest.ancestors(id).unwrap();
        assert!(chain.len() <= forest.len());
        if let Some(&top) = chain.last() {
            assert!(forest.get(top).unwrap().parent_id.is_none());
        }
    }
}

#[test]
fn concurrent_overlapping_deletes_are_serialized() {
    let s = setup();
    let root = s.gate.publish_scene(&s.curator, &scene("root", None, None)).unwrap();
    let mut mids = Vec::new();
    for i in 0..4 {
        let mid = s
            .gate
            .publish_scene(&s.curator, &scene(&format!("m{i}"), Some(root.id), Some((0.1 * i as f64, 0.5))))
            .unwrap();
        for j in 0..3 {
            s.gate
                .publish_scene(&s.curator, &scene(&format!("m{i}-{j}"), Some(mid.id), None))
                .unwrap();
        }
        mids.push(mid.id);
    }

    let gate = Arc::new(s.gate.clone());
    let mut handles = Vec::new();
    for target in std::iter::once(root.id).chain(mids.iter().copied()) {
        let gate = gate.clone();
        let curator = s.curator.clone();
        handles.push(thread::spawn(move || gate.delete_scene(&curator, target)));
    }

    let mut removed = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(report) => removed += report.scenes.len(),
            // Already swept away by a delete of an ancestor.
            Err(Error::NotFound { .. }) => {}
            Err(other) => panic!("unexpected failure: {other}"),
        }
    }

    // Every scene was deleted exactly once.
    assert_eq!(removed, 1 + 4 + 4 * 3);
    let forest = s.gate.graph().forest().unwrap();
    assert!(forest.is_empty());
    assert!(s.blobs.list().unwrap().is_empty());
}

#[test]
fn visitor_cannot_touch_the_graph() {
    let s = setup();
    let a = s.gate.publish_scene(&s.curator, &scene("A", None, None)).unwrap();

    let err = s.gate.delete_scene(&s.visitor, a.id).unwrap_err();
    assert!(matches!(err, Error::Unauthorized { .. }));
    assert!(err.is_recoverable());
    assert_eq!(s.gate.graph().get_scene(a.id).unwrap(), a);
    assert!(s.blobs.exists(a.path.as_deref().unwrap()));
}
