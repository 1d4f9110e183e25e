mod common;

use agent_mem_core::compact::{self, CompactMode};
use common::{context, date, RecordingVcs};
#[macro_use(assert_eq)]
extern crate pretty_assertions;
use speculate2::speculate;

const DECISIONS: &str = "---\ndescription: \"Decisions\"\n---\n\n# Decisions\n\n- [2025-01-01 10:00] Use MySQL\n- [2026-02-01 STALE] ^^^ flagged as stale, may be outdated\n- [2026-03-08 09:00] Use PostgreSQL\n";

speculate! {
    before {
        let (dir, store) = context();
        let vcs = RecordingVcs::with_history(&["init: bootstrap context"]);
        store.write("memory/decisions.md", DECISIONS).unwrap();
        store.write("reflections/2026-03-01.md", "# Reflection 1\n").unwrap();
        store.write("reflections/2026-03-05.md", "# Reflection 2\n").unwrap();
        let today = date("2026-03-10");
    }

    describe "default mode" {
        it "archives old entries and keeps recent ones" {
            let report = compact::compact(&store, &vcs, CompactMode::Default, 7, today, false).unwrap();

            let live = store.read("memory/decisions.md").unwrap().unwrap();
            assert_eq!(
                live,
                "---\ndescription: \"Decisions\"\n---\n\n# Decisions\n\n- [2026-03-08 09:00] Use PostgreSQL\n"
            );
            let archived = store.read("archive/compact-2026-03-10/memory/decisions.md").unwrap().unwrap();
            assert!(archived.contains("- [2025-01-01 10:00] Use MySQL"));
            assert!(!archived.contains("STALE"));

            assert_eq!(report.plan.archived.len(), 2);
            assert!(report.after_bytes < report.plan.before_bytes);
            assert_eq!(
                vcs.last_message().as_deref(),
                Some("compact: archived 2 items, kept recent + pins")
            );
        }

        it "keeps only the latest reflection" {
            compact::compact(&store, &vcs, CompactMode::Default, 7, today, false).unwrap();
            assert!(store.exists("reflections/2026-03-05.md").unwrap());
            assert!(!store.exists("reflections/2026-03-01.md").unwrap());
            assert!(store.exists("archive/compact-2026-03-10/reflections/2026-03-01.md").unwrap());
        }

        it "never touches pinned files or config" {
            let project = store.read("system/project.md").unwrap();
            let config = store.read("config.yaml").unwrap();
            compact::compact(&store, &vcs, CompactMode::Default, 7, today, false).unwrap();
            assert_eq!(store.read("system/project.md").unwrap(), project);
            assert_eq!(store.read("config.yaml").unwrap(), config);
        }

        it "takes a checkpoint when the tree is dirty" {
            vcs.dirty.set(true);
            let report = compact::compact(&store, &vcs, CompactMode::Default, 7, today, false).unwrap();
            assert!(report.checkpoint.is_some());
            assert_eq!(vcs.messages()[1], "compact: pre-compact checkpoint");
        }

        it "does not commit when nothing is old enough" {
            store.remove("reflections/2026-03-01.md").unwrap();
            let report = compact::compact(&store, &vcs, CompactMode::Default, 7, date("2025-01-02"), false).unwrap();
            assert!(report.plan.is_empty());
            assert!(report.commit.is_none());
        }
    }

    describe "dry run" {
        it "reports without touching anything" {
            let report = compact::compact(&store, &vcs, CompactMode::Default, 7, today, true).unwrap();
            assert!(report.dry_run);
            assert_eq!(report.plan.archived.len(), 2);
            assert_eq!(report.after_bytes, report.plan.projected_bytes);
            assert_eq!(store.read("memory/decisions.md").unwrap().as_deref(), Some(DECISIONS));
            assert!(store.exists("reflections/2026-03-01.md").unwrap());
            assert!(!store.exists("archive").unwrap());
            assert_eq!(vcs.messages().len(), 1);
        }
    }

    describe "hard mode" {
        it "keeps pins only" {
            compact::compact(&store, &vcs, CompactMode::Hard, 7, today, false).unwrap();
            let live = store.load("memory/decisions.md").unwrap().unwrap();
            assert!(live.entries.is_empty());
            assert!(store.list_markdown("reflections").unwrap().is_empty());
            assert!(store.exists("system/project.md").unwrap());
            assert_eq!(
                vcs.last_message().as_deref(),
                Some("compact --hard: archived 3 items, kept pins only")
            );
        }
    }
}
