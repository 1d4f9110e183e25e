mod common;

use agent_mem_core::config::Config;
use agent_mem_core::context;
use agent_mem_core::memory::{self, Lesson};
use agent_mem_core::models::Category;
use agent_mem_core::{branch, MemError};
use common::{at, context, date, RecordingVcs};
use speculate2::speculate;

speculate! {
    before {
        let (dir, store) = context();
    }

    describe "init" {
        it "lays out a fresh context" {
            for path in ["main.md", "system/project.md", "system/conventions.md", "config.yaml"] {
                assert!(store.exists(path).unwrap(), "{path} missing");
            }
            for dir in ["memory", "branches", "reflections"] {
                assert!(store.is_dir(dir).unwrap(), "{dir}/ missing");
            }
            assert_eq!(Config::load(&store).unwrap(), Config::default());
            assert!(store.read("main.md").unwrap().unwrap().starts_with("# demo\n"));
        }

        it "refuses to reinitialise without force" {
            let again = context::init(&store, "demo", false, date("2026-03-02"));
            assert!(matches!(again, Err(MemError::Conflict(_))));
            assert!(context::init(&store, "demo", true, date("2026-03-02")).is_ok());
        }
    }

    describe "remember" {
        it "appends to the category file on main" {
            let target = memory::remember(&store, Category::Decision, None, "Use SQLite", "main", at("2026-03-01 10:00")).unwrap();
            assert_eq!(target, "memory/decisions.md");
            let file = store.load(&target).unwrap().unwrap();
            assert_eq!(file.entries.len(), 1);
            assert_eq!(file.entries[0].raw, "- [2026-03-01 10:00] Use SQLite");
        }

        it "writes into the branch overlay while a branch is active" {
            let target = memory::remember(&store, Category::Note, None, "try it", "try-redis", at("2026-03-01 10:00")).unwrap();
            assert_eq!(target, "branches/try-redis/memory/notes.md");
            assert!(!store.exists("memory/notes.md").unwrap());
        }

        it "honours an explicit file" {
            let target = memory::remember(&store, Category::Note, Some("memory/custom.md"), "x", "main", at("2026-03-01 10:00")).unwrap();
            assert_eq!(target, "memory/custom.md");
            assert!(matches!(
                memory::remember(&store, Category::Note, Some("../evil.md"), "x", "main", at("2026-03-01 10:00")),
                Err(MemError::InvalidPath(_))
            ));
        }

        it "rejects empty text" {
            assert!(matches!(
                memory::remember(&store, Category::Note, None, "   ", "main", at("2026-03-01 10:00")),
                Err(MemError::InvalidInput(_))
            ));
        }
    }

    describe "lesson" {
        it "writes a lesson block" {
            let lesson = Lesson::from_input("Hit 429 -> exponential backoff", None, None, None).unwrap();
            let target = memory::lesson(&store, &lesson, "main", at("2026-03-01 10:00")).unwrap();
            assert_eq!(target, "memory/lessons.md");
            let file = store.load(&target).unwrap().unwrap();
            let fields = file.entries[0].lesson_fields().unwrap();
            assert_eq!(fields.problem, "Hit 429");
            assert_eq!(fields.resolution, "exponential backoff");
        }
    }

    describe "forget" {
        it "archives before deleting" {
            store.write("memory/notes.md", "keep me safe\n").unwrap();
            let archived = memory::forget(&store, "memory/notes.md", date("2026-03-05")).unwrap();
            assert_eq!(archived, "archive/forgotten-2026-03-05/memory/notes.md");
            assert_eq!(store.read(&archived).unwrap().as_deref(), Some("keep me safe\n"));
            assert!(!store.exists("memory/notes.md").unwrap());
        }

        it "refuses pinned files and config" {
            assert!(matches!(memory::forget(&store, "system/project.md", date("2026-03-05")), Err(MemError::InvalidInput(_))));
            assert!(matches!(memory::forget(&store, "config.yaml", date("2026-03-05")), Err(MemError::InvalidInput(_))));
            assert!(store.exists("system/project.md").unwrap());
        }

        it "rejects escaping paths and missing files" {
            assert!(matches!(memory::forget(&store, "../../etc/passwd", date("2026-03-05")), Err(MemError::InvalidPath(_))));
            assert!(matches!(memory::forget(&store, "memory/none.md", date("2026-03-05")), Err(MemError::NotFound(_))));
        }
    }

    describe "write" {
        it "creates then updates a file" {
            let (path, existed) = memory::write(&store, "./memory/api.md", "# API\n").unwrap();
            assert_eq!(path, "memory/api.md");
            assert!(!existed);
            let (_, existed) = memory::write(&store, "memory/api.md", "# API v2\n").unwrap();
            assert!(existed);
            assert_eq!(store.read("memory/api.md").unwrap().as_deref(), Some("# API v2\n"));
        }

        it "refuses hidden paths such as the git directory" {
            assert!(matches!(
                memory::write(&store, ".git/config", "[core]\n\tfsmonitor = touch pwned\n"),
                Err(MemError::InvalidPath(_))
            ));
            assert!(matches!(
                memory::write(&store, "memory/.hidden.md", "x"),
                Err(MemError::InvalidPath(_))
            ));
            assert!(!store.exists(".git/config").unwrap());
            assert!(!store.exists("memory/.hidden.md").unwrap());
        }
    }

    describe "pin and unpin" {
        it "moves files without changing content" {
            store.write("memory/api.md", "# API\n").unwrap();
            let (from, to) = memory::pin(&store, "api.md").unwrap();
            assert_eq!((from.as_str(), to.as_str()), ("memory/api.md", "system/api.md"));
            assert_eq!(store.read("system/api.md").unwrap().as_deref(), Some("# API\n"));

            let (_, back) = memory::unpin(&store, "system/api.md").unwrap();
            assert_eq!(back, "memory/api.md");
            assert!(!store.exists("system/api.md").unwrap());
        }

        it "does not overwrite an existing destination" {
            store.write("system/conventions.md", "pinned").unwrap();
            store.write("memory/conventions.md", "loose").unwrap();
            assert!(matches!(memory::pin(&store, "memory/conventions.md"), Err(MemError::Conflict(_))));
            assert!(matches!(memory::unpin(&store, "missing.md"), Err(MemError::NotFound(_))));
        }
    }

    describe "search" {
        it "matches case-insensitively with line numbers" {
            store.write("memory/notes.md", "# Notes\n\n- [2026-03-01] Redis for caching\n").unwrap();
            let hits = memory::search(&store, "redis").unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].path, "memory/notes.md");
            assert_eq!(hits[0].line, 3);
            assert_eq!(hits[0].text, "- [2026-03-01] Redis for caching");
        }
    }

    describe "status" {
        it "counts files and reports the active branch" {
            let vcs = RecordingVcs::with_history(&["init: bootstrap context"]);
            store.write("memory/notes.md", "x").unwrap();
            branch::create(&store, "try-redis", "Redis caching", date("2026-03-01")).unwrap();

            let status = context::status(&store, &vcs, "demo").unwrap();
            assert_eq!(status.branch, "try-redis");
            assert_eq!(status.commits, 1);
            assert_eq!(status.pinned, 2);
            assert_eq!(status.memory, 1);
            assert_eq!(status.branches, 1);
            assert_eq!(status.last.unwrap().message, "init: bootstrap context");
        }

        it "lists branch-scoped memory in the snapshot" {
            let vcs = RecordingVcs::new();
            branch::create(&store, "try-redis", "Redis caching", date("2026-03-01")).unwrap();
            memory::remember(&store, Category::Note, None, "on branch", "try-redis", at("2026-03-01 10:00")).unwrap();

            let snap = context::snapshot(&store, &vcs, "demo").unwrap();
            assert_eq!(snap.branch_memory.len(), 1);
            assert_eq!(snap.branch_memory[0].description.as_deref(), Some("Quick notes and observations"));
            assert_eq!(snap.pinned.len(), 2);
            assert_eq!(snap.branches[0].purpose, "Redis caching");
        }
    }
}
