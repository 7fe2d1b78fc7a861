#![cfg(unix)]

use pdl2pdf::{
    config::Engines,
    engine::{self_test, EngineLayout},
    job::JobLanguage,
};
use std::os::unix::fs::PermissionsExt;

#[test]
fn self_test_reports_each_engine() {
    let dir = tempfile::tempdir().unwrap();
    let ok = dir.path().join("gpcl6");
    std::fs::write(&ok, "#!/bin/sh\nexit 0\n").unwrap();
    std::fs::set_permissions(&ok, std::fs::Permissions::from_mode(0o755)).unwrap();
    // The PostScript engine is expected to accept -h.
    let picky = dir.path().join("gs");
    std::fs::write(&picky, "#!/bin/sh\n[ \"$1\" = \"-h\" ] || exit 3\nexit 0\n").unwrap();
    std::fs::set_permissions(&picky, std::fs::Permissions::from_mode(0o755)).unwrap();

    let engines = Engines {
        pcl: "gpcl6".into(),
        ps: "gs".into(),
        ..Engines::default()
    };
    let results = self_test(&EngineLayout::new(dir.path(), engines));
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.ok), "{results:?}");

    let engines = Engines {
        pcl: "missing".into(),
        ps: "gs".into(),
        ..Engines::default()
    };
    let results = self_test(&EngineLayout::new(dir.path(), engines));
    let pcl = results.iter().find(|r| r.language == JobLanguage::Pcl).unwrap();
    assert!(!pcl.ok);
    assert!(pcl.error.as_deref().unwrap().contains("failed to start"));
}
