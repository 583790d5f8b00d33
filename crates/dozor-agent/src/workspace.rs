//! Workspace bootstrap files and skill catalog (§4.7, §6 Persistent state).

use dozor_proto::Config;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, serde::Deserialize)]
struct SkillFrontMatter {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub body: String,
}

/// No skills ship compiled into the binary; the catalog exists purely so
/// workspace skills (read from disk) have something to shadow. A future
/// release may bundle default skills here.
const BUILTIN_SKILLS: &[(&str, &str, &str)] = &[];

pub fn workspace_dir(config: &Config) -> PathBuf {
    match &config.workspace_dir {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".dozor"),
    }
}

/// Reads a bootstrap file, tolerating absence — a missing file contributes
/// nothing to the system prompt rather than erroring.
fn read_optional(path: &std::path::Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

/// Strips a leading `---\n...\n---\n` YAML front-matter block, returning
/// the parsed front matter (if well-formed) and the remaining body.
fn strip_front_matter(raw: &str) -> (Option<SkillFrontMatter>, &str) {
    let Some(rest) = raw.strip_prefix("---\n") else {
        return (None, raw);
    };
    let Some(end) = rest.find("\n---\n") else {
        return (None, raw);
    };
    let (yaml, body) = rest.split_at(end);
    let body = &body[5..]; // skip "\n---\n"
    let front_matter = serde_yaml::from_str(yaml).ok();
    (front_matter, body)
}

fn load_skill_file(name: &str, raw: &str) -> Skill {
    match strip_front_matter(raw) {
        (Some(front), body) => Skill { name: front.name, description: front.description, body: body.trim_start().to_string() },
        (None, body) => Skill { name: name.to_string(), description: String::new(), body: body.to_string() },
    }
}

fn load_workspace_skills(dir: &std::path::Path) -> Vec<Skill> {
    let skills_dir = dir.join("skills");
    let Ok(entries) = std::fs::read_dir(&skills_dir) else {
        return Vec::new();
    };
    let mut skills = Vec::new();
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let skill_file = entry.path().join("SKILL.md");
        if let Ok(raw) = std::fs::read_to_string(&skill_file) {
            skills.push(load_skill_file(&name, &raw));
        }
    }
    skills
}

/// Loads bootstrap files and the skill catalog from a workspace directory,
/// applying builtin-shadowed-by-workspace semantics by name.
pub struct Workspace {
    pub identity: String,
    pub agents: String,
    pub memory: String,
    pub skills: HashMap<String, Skill>,
}

impl Workspace {
    pub fn load(config: &Config) -> Self {
        let dir = workspace_dir(config);
        let mut skills: HashMap<String, Skill> = BUILTIN_SKILLS
            .iter()
            .map(|(name, description, body)| ((*name).to_string(), Skill { name: (*name).to_string(), description: (*description).to_string(), body: (*body).to_string() }))
            .collect();
        for skill in load_workspace_skills(&dir) {
            skills.insert(skill.name.clone(), skill);
        }
        Self {
            identity: read_optional(&dir.join("IDENTITY.md")),
            agents: read_optional(&dir.join("AGENTS.md")),
            memory: read_optional(&dir.join("MEMORY.md")),
            skills,
        }
    }

    /// One line per skill: `name — description`, sorted for determinism.
    pub fn skill_summary(&self) -> String {
        let mut names: Vec<&String> = self.skills.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let skill = &self.skills[name];
                format!("- {}: {}", skill.name, skill.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Assembles the system prompt: identity, operating instructions,
    /// memory, then the skill catalog summary.
    pub fn system_prompt(&self) -> String {
        let mut sections = Vec::new();
        if !self.identity.trim().is_empty() {
            sections.push(self.identity.trim().to_string());
        }
        if !self.agents.trim().is_empty() {
            sections.push(self.agents.trim().to_string());
        }
        if !self.memory.trim().is_empty() {
            sections.push(format!("# Memory\n\n{}", self.memory.trim()));
        }
        let summary = self.skill_summary();
        if !summary.is_empty() {
            sections.push(format!("# Available skills\n\n{summary}"));
        }
        sections.join("\n\n")
    }
}
