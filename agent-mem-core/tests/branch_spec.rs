mod common;

use agent_mem_core::branch::{self, FileChange};
use agent_mem_core::config::Config;
use agent_mem_core::memory;
use agent_mem_core::models::Category;
use agent_mem_core::MemError;
use common::{at, context, date};
#[macro_use(assert_eq)]
extern crate pretty_assertions;
use speculate2::speculate;

speculate! {
    before {
        let (dir, store) = context();
        branch::create(&store, "try-redis", "Redis too complex?", date("2026-03-01")).unwrap();
    }

    describe "create" {
        it "writes metadata and activates the branch" {
            for file in ["purpose.md", "commits.md", "trace.md"] {
                assert!(store.exists(&format!("branches/try-redis/{file}")).unwrap());
            }
            assert!(!store.exists("branches/try-redis/memory").unwrap());
            assert_eq!(Config::load(&store).unwrap().branch, "try-redis");
        }

        it "rejects duplicates and main" {
            assert!(matches!(
                branch::create(&store, "try-redis", "again", date("2026-03-02")),
                Err(MemError::Conflict(_))
            ));
            assert!(matches!(
                branch::create(&store, "main", "", date("2026-03-02")),
                Err(MemError::Conflict(_))
            ));
        }

        it "rejects names that would escape branches/" {
            assert!(matches!(
                branch::create(&store, "../x", "", date("2026-03-02")),
                Err(MemError::InvalidPath(_))
            ));
        }
    }

    describe "switch" {
        it "returns the previous branch" {
            assert_eq!(branch::switch_to(&store, "main").unwrap(), "try-redis");
            assert_eq!(Config::load(&store).unwrap().branch, "main");
        }

        it "fails for unknown branches" {
            assert!(matches!(branch::switch_to(&store, "nope"), Err(MemError::NotFound(_))));
            assert_eq!(Config::load(&store).unwrap().branch, "try-redis");
        }
    }

    describe "diff" {
        it "is empty for a fresh branch" {
            assert!(branch::diff(&store, "try-redis").unwrap().is_empty());
        }

        it "reports files written on the branch" {
            memory::remember(&store, Category::Note, None, "Redis adds ops burden", "try-redis", at("2026-03-01 12:00")).unwrap();
            let diffs = branch::diff(&store, "try-redis").unwrap();
            assert_eq!(diffs.len(), 1);
            assert_eq!(diffs[0].path, "memory/notes.md");
            assert!(matches!(diffs[0].change, FileChange::Added { .. }));
        }

        it "lists lines added and removed against main" {
            store.write("memory/notes.md", "a\nb\n").unwrap();
            store.write("branches/try-redis/memory/notes.md", "a\nc\n").unwrap();
            let diffs = branch::diff(&store, "try-redis").unwrap();
            assert_eq!(
                diffs[0].change,
                FileChange::Modified {
                    added: vec!["c".to_string()],
                    removed: vec!["b".to_string()],
                }
            );
        }
    }

    describe "merge" {
        it "records the merge and appends branch entries to main" {
            memory::remember(&store, Category::Decision, None, "Stay on in-process cache", "try-redis", at("2026-03-01 12:00")).unwrap();
            memory::remember(&store, Category::Note, None, "Redis adds ops burden", "try-redis", at("2026-03-01 12:05")).unwrap();

            let outcome = branch::merge_back(&store, "try-redis", "Redis too complex", at("2026-03-02 09:00")).unwrap();
            assert_eq!(outcome.entries_merged(), 2);

            let decisions = store.read("memory/decisions.md").unwrap().unwrap();
            assert!(decisions.contains("### [2026-03-02 09:00] Merged branch: try-redis"));
            assert!(decisions.contains("**Purpose:** Redis too complex?"));
            assert!(decisions.contains("**Summary:** Redis too complex"));
            assert!(decisions.contains("- [2026-03-01 12:00] Stay on in-process cache"));

            let notes = store.read("memory/notes.md").unwrap().unwrap();
            assert!(notes.contains("- [2026-03-01 12:05] Redis adds ops burden"));

            assert_eq!(Config::load(&store).unwrap().branch, "main");
            assert!(store.is_dir("branches/try-redis").unwrap());
        }

        it "skips entries already present on main" {
            store.write("memory/notes.md", "# Notes\n\n- [2026-03-01 12:05] Redis adds ops burden\n").unwrap();
            memory::remember(&store, Category::Note, None, "Redis adds ops burden", "try-redis", at("2026-03-01 12:05")).unwrap();

            let outcome = branch::merge_back(&store, "try-redis", "", at("2026-03-02 09:00")).unwrap();
            assert_eq!(outcome.entries_merged(), 0);
            let notes = store.read("memory/notes.md").unwrap().unwrap();
            assert_eq!(notes.matches("Redis adds ops burden").count(), 1);
        }

        it "marks the branch as merged in the listing" {
            branch::create(&store, "try-sqlite", "", date("2026-03-01")).unwrap();
            branch::merge_back(&store, "try-redis", "done", at("2026-03-02 09:00")).unwrap();

            let branches = branch::list(&store).unwrap();
            let names: Vec<_> = branches.iter().map(|b| (b.name.as_str(), b.merged)).collect();
            assert_eq!(names, vec![("try-redis", true), ("try-sqlite", false)]);
            assert!(branches.iter().all(|b| !b.current));
        }

        it "refuses to merge main" {
            assert!(matches!(
                branch::merge_back(&store, "main", "", at("2026-03-02 09:00")),
                Err(MemError::NotFound(_))
            ));
        }
    }
}
