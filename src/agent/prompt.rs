//! 系统提示模板
//!
//! 模板文本中的 `[TOOLS]` / `[AGENTS]` 标记在注册时解析为结构化片段，
//! 构建定义时用解析好的工具与子智能体列表渲染一次，之后不再做字符串替换。

const TOOLS_MARKER: &str = "[TOOLS]";
const AGENTS_MARKER: &str = "[AGENTS]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSection {
    Text(String),
    Tools,
    Agents,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PromptTemplate {
    sections: Vec<PromptSection>,
}

impl PromptTemplate {
    pub fn parse(source: &str) -> Self {
        let mut sections = Vec::new();
        let mut rest = source;
        loop {
            let next = [(TOOLS_MARKER, PromptSection::Tools), (AGENTS_MARKER, PromptSection::Agents)]
                .into_iter()
                .filter_map(|(marker, section)| rest.find(marker).map(|pos| (pos, marker, section)))
                .min_by_key(|(pos, _, _)| *pos);
            match next {
                Some((pos, marker, section)) => {
                    if pos > 0 {
                        sections.push(PromptSection::Text(rest[..pos].to_string()));
                    }
                    sections.push(section);
                    rest = &rest[pos + marker.len()..];
                }
                None => {
                    if !rest.is_empty() {
                        sections.push(PromptSection::Text(rest.to_string()));
                    }
                    break;
                }
            }
        }
        Self { sections }
    }

    pub fn sections(&self) -> &[PromptSection] {
        &self.sections
    }

    /// tools / agents 为 (名称, 描述)
    pub fn render(&self, tools: &[(String, String)], agents: &[(String, String)]) -> String {
        let mut out = String::new();
        for section in &self.sections {
            match section {
                PromptSection::Text(t) => out.push_str(t),
                PromptSection::Tools => out.push_str(&render_list(tools)),
                PromptSection::Agents => out.push_str(&render_list(agents)),
            }
        }
        out
    }
}

fn render_list(items: &[(String, String)]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .map(|(name, desc)| {
            if desc.is_empty() {
                format!("- {name}")
            } else {
                format!("- {name}: {desc}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markers() {
        let t = PromptTemplate::parse("You can use:\n[TOOLS]\nAgents:\n[AGENTS]");
        assert_eq!(
            t.sections(),
            &[
                PromptSection::Text("You can use:\n".into()),
                PromptSection::Tools,
                PromptSection::Text("\nAgents:\n".into()),
                PromptSection::Agents,
            ]
        );
    }

    #[test]
    fn test_render_lists() {
        let t = PromptTemplate::parse("Tools:\n[TOOLS]\n[AGENTS]");
        let out = t.render(&[("add_one".into(), "n + 1".into())], &[]);
        assert_eq!(out, "Tools:\n- add_one: n + 1\n(none)");
    }

    #[test]
    fn test_plain_text_untouched() {
        let t = PromptTemplate::parse("Always answer 42.");
        assert_eq!(t.render(&[], &[]), "Always answer 42.");
    }
}
