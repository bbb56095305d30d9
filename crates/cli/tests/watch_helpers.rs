use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use sorter_cli::watch::{arrivals, collect_arrivals, prepare_root};
use std::fs;

fn event(kind: EventKind, paths: &[&std::path::Path]) -> Event {
    paths
        .iter()
        .fold(Event::new(kind), |ev, p| ev.add_path(p.to_path_buf()))
}

#[test]
fn created_files_in_root_are_arrivals() {
    let root = tempfile::tempdir().unwrap();
    let root = prepare_root(root.path()).unwrap();
    let file = root.join("invoice_march.pdf");
    fs::write(&file, "x").unwrap();

    let ev = event(EventKind::Create(CreateKind::File), &[&file]);
    assert_eq!(arrivals(&ev, &root, true), vec![file.clone()]);

    let ev = event(EventKind::Create(CreateKind::Any), &[&file]);
    assert_eq!(arrivals(&ev, &root, true), vec![file]);
}

#[test]
fn directories_are_never_arrivals() {
    let root = tempfile::tempdir().unwrap();
    let root = prepare_root(root.path()).unwrap();
    let sub = root.join("Invoices");
    fs::create_dir(&sub).unwrap();

    let ev = event(EventKind::Create(CreateKind::Folder), &[&sub]);
    assert!(arrivals(&ev, &root, true).is_empty());
    // Some backends do not say what was created.
    let ev = event(EventKind::Create(CreateKind::Any), &[&sub]);
    assert!(arrivals(&ev, &root, true).is_empty());
}

#[test]
fn nested_paths_are_ignored() {
    let root = tempfile::tempdir().unwrap();
    let root = prepare_root(root.path()).unwrap();
    fs::create_dir(root.join("Work")).unwrap();
    let nested = root.join("Work").join("deck.pptx");
    fs::write(&nested, "x").unwrap();

    let ev = event(EventKind::Create(CreateKind::File), &[&nested]);
    assert!(arrivals(&ev, &root, true).is_empty());
}

#[test]
fn renames_into_root_follow_the_config_switch() {
    let root = tempfile::tempdir().unwrap();
    let root = prepare_root(root.path()).unwrap();
    let done = root.join("report.pdf");
    fs::write(&done, "x").unwrap();

    let ev = event(
        EventKind::Modify(ModifyKind::Name(RenameMode::To)),
        &[&done],
    );
    assert_eq!(arrivals(&ev, &root, true), vec![done.clone()]);
    assert!(arrivals(&ev, &root, false).is_empty());

    let gone = root.join("report.pdf.crdownload");
    let ev = event(
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
        &[&gone],
    );
    assert!(arrivals(&ev, &root, true).is_empty());

    let ev = event(
        EventKind::Modify(ModifyKind::Name(RenameMode::From)),
        &[&done],
    );
    assert!(arrivals(&ev, &root, true).is_empty());
}

#[test]
fn other_event_kinds_are_not_arrivals() {
    let root = tempfile::tempdir().unwrap();
    let root = prepare_root(root.path()).unwrap();
    let file = root.join("a.txt");
    fs::write(&file, "x").unwrap();

    for kind in [
        EventKind::Modify(ModifyKind::Data(DataChange::Content)),
        EventKind::Remove(RemoveKind::File),
        EventKind::Access(notify::event::AccessKind::Any),
    ] {
        assert!(arrivals(&event(kind, &[&file]), &root, true).is_empty());
    }
}

#[test]
fn batches_collapse_duplicate_notifications() {
    let root = tempfile::tempdir().unwrap();
    let root = prepare_root(root.path()).unwrap();
    let a = root.join("a.png");
    let b = root.join("b.png");
    fs::write(&a, "x").unwrap();
    fs::write(&b, "x").unwrap();

    let batch = vec![
        event(EventKind::Create(CreateKind::File), &[&a]),
        event(EventKind::Modify(ModifyKind::Data(DataChange::Any)), &[&a]),
        event(EventKind::Create(CreateKind::File), &[&b]),
        event(EventKind::Create(CreateKind::File), &[&a]),
    ];
    assert_eq!(collect_arrivals(batch, &root, true), vec![a, b]);
}

#[test]
fn missing_watch_folder_is_created() {
    let base = tempfile::tempdir().unwrap();
    let wanted = base.path().join("Downloads").join("inbox");
    let root = prepare_root(&wanted).unwrap();
    assert!(root.is_dir());
    assert!(root.ends_with("inbox"));
}
