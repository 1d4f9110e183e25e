use agent_mem::commands::{create_context_dir, project_name, Session};
use agent_mem_core::branch;
use agent_mem_core::context;
use agent_mem_core::lock::LOCK_FILE;
use agent_mem_core::share;
use agent_mem_core::store::{ContextStore, CONTEXT_DIR};
use agent_mem_core::vcs::{CommitInfo, FileStat, Vcs};
use agent_mem_core::Result as MemResult;
use chrono::NaiveDate;
use speculate2::speculate;
use tempfile::TempDir;

fn init_context(dir: &TempDir) -> ContextStore {
    let store = ContextStore::for_project(dir.path());
    let today = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
    context::init(&store, "demo", false, today).expect("Failed to init context");
    store
}

const SNAPSHOT: &str = r##"{
  "version": 1,
  "project": "demo",
  "branch": "main",
  "commits": 3,
  "lastCommit": "abc1234",
  "createdAt": "2026-03-10T12:00:00Z",
  "files": {
    "main.md": "# demo\n",
    "memory/notes.md": "# Notes\n\n- [2026-03-01] shared note\n"
  }
}"##;

/// Accepts commits without touching git.
struct NoHistory;

impl Vcs for NoHistory {
    fn commit(&self, _message: &str) -> MemResult<Option<String>> {
        Ok(None)
    }

    fn has_changes(&self) -> bool {
        false
    }

    fn commit_count(&self, _since: Option<&str>) -> usize {
        0
    }

    fn log(&self, _since: Option<&str>, _max: usize) -> MemResult<Vec<CommitInfo>> {
        Ok(Vec::new())
    }

    fn diff_stat(&self, _since: &str) -> MemResult<Vec<FileStat>> {
        Ok(Vec::new())
    }

    fn diff_text(&self, _since: &str, _path: &str) -> MemResult<String> {
        Ok(String::new())
    }

    fn first_commit(&self) -> Option<CommitInfo> {
        None
    }

    fn last_commit(&self) -> Option<CommitInfo> {
        None
    }
}

speculate! {
    before {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = init_context(&dir);
    }

    describe "Session::at" {
        it "loads the config and active branch" {
            branch::create(&store, "try-redis", "", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
                .expect("Failed to create branch");
            let session = Session::at(dir.path()).expect("Failed to open session");
            assert_eq!(session.branch(), "try-redis");
            assert_eq!(session.root, dir.path());
            assert_eq!(session.store.root(), store.root());
        }

        it "reports a broken config" {
            store.write("config.yaml", "reflection: [not, a, mapping]\n").unwrap();
            let err = Session::at(dir.path()).err().expect("config should not load");
            assert!(err.to_string().contains("config.yaml"));
        }
    }

    describe "importing into a fresh project" {
        it "creates the context directory before writing" {
            let empty = TempDir::new().expect("Failed to create temp dir");
            let created = create_context_dir(empty.path()).expect("Failed to create .context/");
            assert_eq!(created, empty.path().join(CONTEXT_DIR));
            assert!(created.is_dir());

            let session = Session::at(empty.path()).expect("Failed to open session");
            assert_eq!(session.branch(), "main");
            let envelope = share::parse(SNAPSHOT).expect("Failed to parse snapshot");
            let outcome = share::import(&session.store, &NoHistory, &envelope, false)
                .expect("Failed to import");
            assert_eq!(outcome.written, 2);
            assert_eq!(
                session.store.read("memory/notes.md").unwrap().as_deref(),
                Some("# Notes\n\n- [2026-03-01] shared note\n")
            );
        }

        it "reuses an existing repository" {
            let empty = TempDir::new().expect("Failed to create temp dir");
            std::fs::create_dir_all(empty.path().join(CONTEXT_DIR).join(".git")).unwrap();
            let session = Session::open_or_create(empty.path()).expect("Failed to open session");
            assert_eq!(session.store.root(), empty.path().join(CONTEXT_DIR));
            assert_eq!(
                create_context_dir(empty.path()).unwrap(),
                empty.path().join(CONTEXT_DIR)
            );
        }
    }

    describe "lock" {
        it "holds the lock file while the guard lives" {
            let session = Session::at(dir.path()).expect("Failed to open session");
            {
                let _guard = session.lock().expect("Failed to lock");
                assert!(dir.path().join(LOCK_FILE).exists());
            }
            assert!(!dir.path().join(LOCK_FILE).exists());
        }
    }

    describe "project_name" {
        it "uses the project directory name" {
            let project = dir.path().join("my-app");
            std::fs::create_dir(&project).unwrap();
            assert_eq!(project_name(&project), "my-app");
        }
    }
}
