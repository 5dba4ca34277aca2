//! Persona, tone and writing-style tags mapped to the
//! instruction fragments embedded in every prompt, plus topic categorisation.
//!
//! Tags arrive as strings. The HTTP boundary rejects unknown expertise/tone
//! tags, but the composer never fails on them: unknown persona and tone tags
//! degrade to an empty fragment and unknown styles fall back to `balanced`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Declares a tag enum with its wire names, instruction fragments and parsing.
macro_rules! voice_tags {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => ($tag:literal, $fragment:expr)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }

            pub fn instruction(&self) -> &'static str {
                match self {
                    $($name::$variant => $fragment),+
                }
            }

            /// Wire names of every variant, in declaration order.
            pub fn tags() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl FromStr for $name {
            type Err = UnknownTag;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok($name::$variant),)+
                    other => Err(UnknownTag(other.to_string())),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTag(pub String);

impl fmt::Display for UnknownTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tag '{}'", self.0)
    }
}

voice_tags! {
    /// The persona the model writes as.
    Expertise {
        Storyteller => ("storyteller", "Present the opinion in a narrative style with real-world examples"),
        Novelist => ("novelist", "Provide a detailed analysis with rich context and character perspectives"),
        Journalist => ("journalist", "Present factual, well-researched information with current events"),
        Poet => ("poet", "Express the opinion through metaphors and emotional resonance"),
        Screenwriter => ("screenwriter", "Frame the opinion through dialogue and real-world scenarios"),
        Critic => ("critic", "Analyze the topic with critical thinking and balanced perspectives"),
        Researcher => ("researcher", "Present in-depth analysis with academic rigor and citations"),
        Educator => ("educator", "Explain concepts clearly with examples and learning objectives"),
        Analyst => ("analyst", "Provide data-driven insights and expert analysis"),
    }
}

voice_tags! {
    Tone {
        Funny => ("funny", "Include humor while maintaining respect for serious topics"),
        Serious => ("serious", "Maintain a professional and formal tone"),
        Dramatic => ("dramatic", "Emphasize significant impacts and consequences"),
        Sarcastic => ("sarcastic", "Use clever observations while staying constructive"),
        Critical => ("critical", "Provide balanced analysis with supporting evidence"),
        Mysterious => ("mysterious", "Explore hidden aspects and implications"),
        Emotional => ("emotional", "Focus on human impact and personal experiences"),
        Neutral => ("neutral", "Present balanced viewpoints without bias"),
        Educational => ("educational", "Focus on clear explanations and learning outcomes"),
        Technical => ("technical", "Use precise terminology while remaining accessible"),
        Casual => ("casual", "Maintain an approachable, conversational style"),
    }
}

voice_tags! {
    WritingStyle {
        Factual => ("factual", "\
- Focus on verified facts and data
- Include statistics and research findings
- Cite credible sources and studies
- Present objective information
- Minimize speculation and opinion"),
        Relatable => ("relatable", "\
- Use real-world examples and scenarios
- Connect concepts to daily life
- Share personal experiences and anecdotes
- Make complex ideas accessible
- Include practical applications"),
        Analytical => ("analytical", "\
- Break down complex concepts
- Examine cause and effect relationships
- Compare and contrast different aspects
- Evaluate pros and cons
- Provide detailed analysis"),
        Narrative => ("narrative", "\
- Tell a compelling story
- Use character perspectives
- Create engaging scenarios
- Build narrative tension
- Include descriptive details"),
        Practical => ("practical", "\
- Focus on actionable insights
- Provide step-by-step guidance
- Include hands-on examples
- Share best practices
- Offer practical solutions"),
        Balanced => ("balanced", "\
- Present multiple viewpoints
- Consider different perspectives
- Weigh advantages and disadvantages
- Provide balanced analysis
- Include diverse examples"),
    }
}

impl Default for WritingStyle {
    fn default() -> Self {
        WritingStyle::Balanced
    }
}

/// Persona fragment for a raw tag; empty when the tag is unknown.
pub fn expertise_instruction(tag: &str) -> &'static str {
    tag.parse::<Expertise>()
        .map(|e| e.instruction())
        .unwrap_or("")
}

/// Tone fragment for a raw tag; empty when the tag is unknown.
pub fn tone_instruction(tag: &str) -> &'static str {
    tag.parse::<Tone>().map(|t| t.instruction()).unwrap_or("")
}

/// Style for a raw tag, falling back to [`WritingStyle::Balanced`].
pub fn writing_style_or_default(tag: &str) -> WritingStyle {
    tag.parse().unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
    Technical,
    Creative,
    Educational,
    Business,
    General,
}

impl TopicCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicCategory::Technical => "technical",
            TopicCategory::Creative => "creative",
            TopicCategory::Educational => "educational",
            TopicCategory::Business => "business",
            TopicCategory::General => "general",
        }
    }
}

impl fmt::Display for TopicCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword table in match order. First category with any substring hit wins.
const CATEGORY_KEYWORDS: &[(TopicCategory, &[&str])] = &[
    (
        TopicCategory::Technical,
        &["programming", "technology", "science", "engineering", "math", "data", "algorithm", "system"],
    ),
    (
        TopicCategory::Creative,
        &["art", "music", "writing", "design", "creative", "story", "poetry", "fiction"],
    ),
    (
        TopicCategory::Educational,
        &["learning", "education", "teaching", "study", "academic", "school", "university", "course"],
    ),
    (
        TopicCategory::Business,
        &["business", "marketing", "finance", "management", "strategy", "entrepreneurship", "startup"],
    ),
];

/// Categorises a topic by case-insensitive keyword matching. Total: always returns a category.
pub fn topic_category(topic: &str) -> TopicCategory {
    let topic = topic.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| topic.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(TopicCategory::General)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip_through_from_str() {
        for e in Expertise::ALL {
            assert_eq!(e.as_str().parse::<Expertise>().unwrap(), *e);
        }
        for t in Tone::ALL {
            assert_eq!(t.as_str().parse::<Tone>().unwrap(), *t);
        }
        for s in WritingStyle::ALL {
            assert_eq!(s.as_str().parse::<WritingStyle>().unwrap(), *s);
        }
    }

    #[test]
    fn test_catalog_sizes() {
        assert_eq!(Expertise::ALL.len(), 9);
        assert_eq!(Tone::ALL.len(), 11);
        assert_eq!(WritingStyle::ALL.len(), 6);
    }

    #[test]
    fn test_researcher_instruction_mentions_rigor() {
        assert!(expertise_instruction("researcher").contains("academic rigor"));
    }

    #[test]
    fn test_unknown_persona_and_tone_degrade_to_empty() {
        assert_eq!(expertise_instruction("wizard"), "");
        assert_eq!(tone_instruction("whimsical"), "");
        assert_eq!(tone_instruction("Technical"), "", "tags are case-sensitive");
    }

    #[test]
    fn test_unknown_style_falls_back_to_balanced() {
        assert_eq!(writing_style_or_default("poetic"), WritingStyle::Balanced);
        assert_eq!(writing_style_or_default(""), WritingStyle::Balanced);
        assert_eq!(writing_style_or_default("narrative"), WritingStyle::Narrative);
    }

    #[test]
    fn test_topic_category_keyword_match() {
        assert_eq!(topic_category("Intro to Programming in Rust"), TopicCategory::Technical);
        assert_eq!(topic_category("Poetry of the Romantics"), TopicCategory::Creative);
        assert_eq!(topic_category("How to study effectively"), TopicCategory::Educational);
        assert_eq!(topic_category("Marketing plans for bakeries"), TopicCategory::Business);
    }

    #[test]
    fn test_topic_category_first_match_wins() {
        // "data" (technical) and "marketing" (business) both match; technical is checked first.
        assert_eq!(topic_category("Data-driven marketing"), TopicCategory::Technical);
    }

    #[test]
    fn test_topic_category_falls_back_to_general() {
        assert_eq!(topic_category("quantum computing"), TopicCategory::General);
        assert_eq!(topic_category(""), TopicCategory::General);
    }

    #[test]
    fn test_topic_category_is_substring_based() {
        // "art" matches inside "party", mirroring the plain substring rule.
        assert_eq!(topic_category("Garden party"), TopicCategory::Creative);
    }
}
