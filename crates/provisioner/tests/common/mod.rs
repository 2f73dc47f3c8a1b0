//! In-memory cloud and scripted prompts shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use pdf_provision::cloud::{BillingAccount, CloudCli, CloudError, CloudResult, IndexKind};
use pdf_provision::error::ProvisionError;
use pdf_provision::prompt::{Answer, Prompter};
use pdf_provision::schema::{FieldMode, FieldSpec, FieldType};

pub const ACCOUNT: &str = "dev@example.com";

/// Everything the fake provider knows.
#[derive(Debug, Default)]
pub struct FakeState {
    pub missing_tools: HashSet<String>,
    pub accounts: Vec<String>,
    pub projects: BTreeSet<String>,
    pub active_project: Option<String>,
    pub billing_linked: HashSet<String>,
    pub billing_accounts: Vec<BillingAccount>,
    pub services: HashSet<String>,
    pub buckets: HashSet<String>,
    pub datasets: HashSet<String>,
    pub tables: Vec<(String, Vec<FieldSpec>)>,
    pub search_indexes: HashSet<String>,
    pub vector_indexes: HashSet<String>,
    pub service_accounts: HashSet<String>,
    pub user_keys: Vec<String>,
    pub system_keys: Vec<String>,
    pub bindings: Vec<(String, String)>,
    next_key: u32,

    /// Every call made, mutating or not.
    pub calls: usize,
    /// Resource creations (project, API, bucket, dataset, table, index, account).
    pub creates: Vec<String>,
    /// Every call that changes provider state.
    pub mutations: Vec<String>,
    /// SQL statements submitted through `run_query`.
    pub queries: Vec<String>,
    /// Operations forced to fail.
    failing: HashSet<String>,
}

impl FakeState {
    fn fail_if(&self, op: &str) -> CloudResult<()> {
        if self.failing.contains(op) {
            Err(CloudError::CommandFailed {
                command: format!("fake {op}"),
                status: "exit status: 1".to_string(),
                stderr: format!("injected failure: {op}"),
            })
        } else {
            Ok(())
        }
    }

    fn table(&self, name: &str) -> Option<&Vec<FieldSpec>> {
        self.tables.iter().find(|(t, _)| t == name).map(|(_, f)| f)
    }

    fn mutate(&mut self, what: String) {
        self.mutations.push(what);
    }

    fn create(&mut self, what: String) {
        self.mutations.push(what.clone());
        self.creates.push(what);
    }
}

/// Cloneable handle to shared fake state.
#[derive(Debug, Clone)]
pub struct FakeCloud {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCloud {
    /// Tools installed, one authenticated account, nothing provisioned.
    pub fn new() -> Self {
        let state = FakeState {
            accounts: vec![ACCOUNT.to_string()],
            ..FakeState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn fail_on(self, op: &str) -> Self {
        self.state().failing.insert(op.to_string());
        self
    }

    pub fn without_tool(self, tool: &str) -> Self {
        self.state().missing_tools.insert(tool.to_string());
        self
    }

    pub fn with_project(self, project: &str) -> Self {
        self.state().projects.insert(project.to_string());
        self
    }

    pub fn with_active_project(self, project: &str) -> Self {
        self.state().active_project = Some(project.to_string());
        self
    }

    pub fn with_billing_account(self, id: &str, open: bool) -> Self {
        self.state().billing_accounts.push(BillingAccount {
            id: id.to_string(),
            display_name: format!("Account {id}"),
            open,
        });
        self
    }

    pub fn with_service_account(self, email: &str) -> Self {
        self.state().service_accounts.insert(email.to_string());
        self
    }

    pub fn with_user_keys(self, count: usize) -> Self {
        {
            let mut state = self.state();
            for i in 0..count {
                state.user_keys.push(format!("old-user-key-{i}"));
            }
        }
        self
    }

    pub fn with_system_key(self, key: &str) -> Self {
        self.state().system_keys.push(key.to_string());
        self
    }

    pub fn with_table(self, name: &str, fields: Vec<FieldSpec>) -> Self {
        self.state().tables.push((name.to_string(), fields));
        self
    }

    pub fn with_vector_index(self, name: &str) -> Self {
        self.state().vector_indexes.insert(name.to_string());
        self
    }

    fn enter(&self) -> MutexGuard<'_, FakeState> {
        let mut state = self.state();
        state.calls += 1;
        state
    }
}

/// Column list of a `CREATE TABLE` statement.
fn parse_create_table(sql: &str) -> (String, Vec<FieldSpec>) {
    let table_ref = sql.split('`').nth(1).unwrap_or_default();
    let table = table_ref.rsplit('.').next().unwrap_or_default().to_string();

    let fields = sql
        .lines()
        .skip(1)
        .map(|l| l.trim().trim_end_matches(','))
        .filter(|l| !l.is_empty() && *l != ")")
        .map(|l| {
            let mut parts = l.split_whitespace();
            let name = parts.next().unwrap_or_default().to_string();
            let ty = match parts.next() {
                Some("ARRAY<FLOAT64>") => FieldType::Float64Array,
                _ => FieldType::String,
            };
            let mode = if l.ends_with("NOT NULL") {
                FieldMode::Required
            } else {
                FieldMode::Nullable
            };
            FieldSpec { name, ty, mode }
        })
        .collect();
    (table, fields)
}

fn index_name(sql: &str, keyword: &str) -> String {
    sql.split_whitespace()
        .skip_while(|w| *w != keyword)
        .nth(1)
        .unwrap_or_default()
        .to_string()
}

impl CloudCli for FakeCloud {
    fn tool_available(&self, tool: &str) -> bool {
        !self.enter().missing_tools.contains(tool)
    }

    fn active_accounts(&self) -> CloudResult<Vec<String>> {
        Ok(self.enter().accounts.clone())
    }

    fn list_projects(&self) -> CloudResult<Vec<String>> {
        Ok(self.enter().projects.iter().cloned().collect())
    }

    fn active_project(&self) -> CloudResult<Option<String>> {
        Ok(self.enter().active_project.clone())
    }

    fn project_exists(&self, project: &str) -> CloudResult<bool> {
        Ok(self.enter().projects.contains(project))
    }

    fn create_project(&self, project: &str, _display_name: &str) -> CloudResult<()> {
        let mut state = self.enter();
        state.fail_if("create_project")?;
        state.projects.insert(project.to_string());
        state.create(format!("project {project}"));
        Ok(())
    }

    fn set_active_project(&self, project: &str) -> CloudResult<()> {
        let mut state = self.enter();
        state.active_project = Some(project.to_string());
        state.mutate(format!("config project {project}"));
        Ok(())
    }

    fn billing_enabled(&self, project: &str) -> CloudResult<bool> {
        Ok(self.enter().billing_linked.contains(project))
    }

    fn list_billing_accounts(&self) -> CloudResult<Vec<BillingAccount>> {
        Ok(self.enter().billing_accounts.clone())
    }

    fn link_billing(&self, project: &str, account: &str) -> CloudResult<()> {
        let mut state = self.enter();
        state.fail_if("link_billing")?;
        state.billing_linked.insert(project.to_string());
        state.create(format!("billing {project} {account}"));
        Ok(())
    }

    fn enabled_services(&self, _project: &str) -> CloudResult<Vec<String>> {
        Ok(self.enter().services.iter().cloned().collect())
    }

    fn enable_service(&self, _project: &str, service: &str) -> CloudResult<()> {
        let mut state = self.enter();
        state.fail_if("enable_service")?;
        state.services.insert(service.to_string());
        state.create(format!("service {service}"));
        Ok(())
    }

    fn bucket_exists(&self, _project: &str, bucket: &str) -> CloudResult<bool> {
        Ok(self.enter().buckets.contains(bucket))
    }

    fn create_bucket(&self, _project: &str, bucket: &str, _region: &str) -> CloudResult<()> {
        let mut state = self.enter();
        state.fail_if("create_bucket")?;
        state.buckets.insert(bucket.to_string());
        state.create(format!("bucket {bucket}"));
        Ok(())
    }

    fn dataset_exists(&self, _project: &str, dataset: &str) -> CloudResult<bool> {
        Ok(self.enter().datasets.contains(dataset))
    }

    fn create_dataset(
        &self,
        _project: &str,
        dataset: &str,
        _region: &str,
        _description: &str,
    ) -> CloudResult<()> {
        let mut state = self.enter();
        state.fail_if("create_dataset")?;
        state.datasets.insert(dataset.to_string());
        state.create(format!("dataset {dataset}"));
        Ok(())
    }

    fn table_exists(&self, _project: &str, _dataset: &str, table: &str) -> CloudResult<bool> {
        Ok(self.enter().table(table).is_some())
    }

    fn table_schema(
        &self,
        _project: &str,
        _dataset: &str,
        table: &str,
    ) -> CloudResult<Vec<FieldSpec>> {
        let state = self.enter();
        state.table(table).cloned().ok_or_else(|| CloudError::CommandFailed {
            command: format!("fake show {table}"),
            status: "exit status: 1".to_string(),
            stderr: format!("Not found: Table {table}"),
        })
    }

    fn run_query(&self, _project: &str, _region: &str, sql: &str) -> CloudResult<String> {
        let mut state = self.enter();
        state.queries.push(sql.to_string());
        if sql.starts_with("CREATE TABLE") {
            state.fail_if("create_table")?;
            let (table, fields) = parse_create_table(sql);
            if state.table(&table).is_none() {
                state.tables.push((table.clone(), fields));
                state.create(format!("table {table}"));
            }
        } else if sql.starts_with("CREATE SEARCH INDEX") {
            state.fail_if("text_index")?;
            let name = index_name(sql, "EXISTS");
            state.search_indexes.insert(name.clone());
            state.create(format!("search index {name}"));
        } else if sql.contains("VECTOR INDEX") {
            if sql.contains("ivf_options") {
                state.fail_if("vector_index_ivf")?;
            }
            state.fail_if("vector_index")?;
            let name = index_name(sql, "INDEX");
            state.vector_indexes.insert(name.clone());
            state.create(format!("vector index {name}"));
        }
        Ok("[]".to_string())
    }

    fn index_exists(
        &self,
        _project: &str,
        _region: &str,
        _dataset: &str,
        _table: &str,
        kind: IndexKind,
        index: &str,
    ) -> CloudResult<bool> {
        let state = self.enter();
        state.fail_if("index_lookup")?;
        Ok(match kind {
            IndexKind::Search => state.search_indexes.contains(index),
            IndexKind::Vector => state.vector_indexes.contains(index),
        })
    }

    fn service_account_exists(&self, _project: &str, email: &str) -> CloudResult<bool> {
        Ok(self.enter().service_accounts.contains(email))
    }

    fn create_service_account(
        &self,
        project: &str,
        name: &str,
        _display_name: &str,
    ) -> CloudResult<()> {
        let mut state = self.enter();
        state.fail_if("create_service_account")?;
        let email = format!("{name}@{project}.iam.gserviceaccount.com");
        state.service_accounts.insert(email.clone());
        state.create(format!("service account {email}"));
        Ok(())
    }

    fn list_user_managed_keys(&self, _project: &str, _email: &str) -> CloudResult<Vec<String>> {
        let state = self.enter();
        state.fail_if("list_user_managed_keys")?;
        Ok(state.user_keys.clone())
    }

    fn delete_key(&self, _project: &str, _email: &str, key_id: &str) -> CloudResult<()> {
        let mut state = self.enter();
        state.fail_if("delete_key")?;
        state.user_keys.retain(|k| k != key_id);
        state.mutate(format!("delete key {key_id}"));
        Ok(())
    }

    fn create_key(&self, _project: &str, email: &str, path: &Path) -> CloudResult<()> {
        let mut state = self.enter();
        state.fail_if("create_key")?;
        state.next_key += 1;
        let key = format!("new-key-{}", state.next_key);
        std::fs::write(
            path,
            format!(r#"{{"type":"service_account","client_email":"{email}","private_key_id":"{key}"}}"#),
        )
        .map_err(|source| CloudError::Spawn {
            command: "fake keys create".to_string(),
            source,
        })?;
        state.user_keys.push(key.clone());
        state.mutate(format!("create key {key}"));
        Ok(())
    }

    fn add_role_binding(&self, _project: &str, member: &str, role: &str) -> CloudResult<()> {
        let mut state = self.enter();
        state.fail_if(&format!("add_role_binding:{role}"))?;
        let binding = (member.to_string(), role.to_string());
        if !state.bindings.contains(&binding) {
            state.bindings.push(binding);
        }
        state.mutate(format!("bind {role}"));
        Ok(())
    }
}

/// Prompter with fixed answers.
#[derive(Debug, Clone)]
pub struct ScriptedPrompter {
    pub project: Answer,
    pub edited_id: Option<String>,
    pub billing: Option<usize>,
    pub proceed: bool,
}

impl Default for ScriptedPrompter {
    fn default() -> Self {
        Self {
            project: Answer::CreateNew,
            edited_id: None,
            billing: Some(0),
            proceed: true,
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn choose_project(
        &self,
        _default: Option<&str>,
        _candidates: &[String],
    ) -> Result<Answer, ProvisionError> {
        Ok(self.project)
    }

    fn edit_project_id(&self, generated: &str) -> Result<String, ProvisionError> {
        Ok(self.edited_id.clone().unwrap_or_else(|| generated.to_string()))
    }

    fn choose_billing_account(
        &self,
        _accounts: &[BillingAccount],
    ) -> Result<Option<usize>, ProvisionError> {
        Ok(self.billing)
    }

    fn confirm(&self, _prompt: &str, _default: bool) -> Result<bool, ProvisionError> {
        Ok(self.proceed)
    }
}
