// All LLM prompt constants for the Generation module.
// Story templates use `{placeholder}` substitution (see composer.rs);
// the summary and reference prompts use plain `.replace()`.

/// Built-in story structure. Also seeded as the stored "default" template.
/// Placeholders: {part_number}, {total_parts}, {topic}, {topic_category},
/// {context_text}, {previous_context}, {expertise}, {expertise_instructions},
/// {tone}, {tone_instructions}, {category_instructions}
pub const DEFAULT_STORY_TEMPLATE: &str = r#"Generate part {part_number} of {total_parts} discussing this topic: {topic}
Category: {topic_category}
{context_text}
{previous_context}

Writing Guidelines:
- Write as a {expertise}: {expertise_instructions}
- Use a {tone} tone: {tone_instructions}

Writing Style Guidelines:
{category_instructions}

General Requirements:
- Focus on accuracy and relevance
- Include specific examples and references
- Consider multiple perspectives
- Support statements with evidence
- Address potential questions or concerns
- Provide practical insights when applicable
- AVOID repeating information from previous parts
- Build upon and expand previous discussions
- Introduce new aspects and perspectives

Structure Requirements:
- Minimum length: 4000 characters
- Use clear paragraphs and transitions
- Include relevant data when applicable
- Balance theory and practice
- Maintain professional yet accessible language
- Format for easy reading and comprehension"#;

pub const OPENING_GUIDANCE: &str = r#"
For this opening part:
- Introduce the topic and its significance
- Provide essential background information
- Present the foundational concepts
- Outline the key aspects to be explored in later parts
- Set up the framework for subsequent discussions"#;

pub const CLOSING_GUIDANCE: &str = r#"
For this final part:
- Build upon previous discussions without repeating them
- Explore advanced concepts and implications
- Draw connections between all previous parts
- Synthesize insights from earlier sections
- Provide forward-looking conclusions
- Offer unique perspectives and recommendations"#;

pub const EARLY_MIDDLE_GUIDANCE: &str = r#"
For this early-middle part:
- Expand on the foundational concepts
- Introduce new perspectives and angles
- Deepen the analysis with specific examples
- Avoid repeating basic information
- Bridge to more complex aspects"#;

pub const MIDDLE_GUIDANCE: &str = r#"
For this middle part:
- Focus on complex interconnections
- Present contrasting viewpoints
- Analyze practical applications
- Introduce advanced concepts
- Avoid retreading earlier discussions"#;

pub const LATE_MIDDLE_GUIDANCE: &str = r#"
For this late-middle part:
- Explore sophisticated implications
- Present expert insights
- Address emerging trends
- Connect to broader contexts
- Prepare for concluding insights"#;

/// Appended to every story prompt, built-in or custom.
pub const CONTINUITY_REMINDER: &str = r#"
CRITICAL CONTINUITY REQUIREMENTS:
- Each part must progress the discussion forward
- Never repeat information from previous parts
- Reference previous concepts only to build upon them
- Introduce new aspects and perspectives in each part
- Ensure a logical flow between parts
- Maintain consistent terminology while exploring new areas"#;

/// Part summary prompt. Replace `{text}` before sending.
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"Create a concise summary (maximum 400 words) of the following content segment.
Focus on:
1. Key points and main arguments presented
2. New concepts or perspectives introduced
3. Important conclusions or insights
4. Areas set up for future discussion

Do NOT include:
- Basic background information
- Previously covered material
- General context already established

Content to summarize:
{text}

Provide a focused summary that highlights the unique contributions of this segment and sets up for the next part."#;

/// Per-reference analysis prompt. Replace `{content}` before sending.
pub const REFERENCE_ANALYSIS_PROMPT: &str = r#"Analyze this reference content in detail:

{content}

Extract and preserve:
1. Main points and key information
2. Specific examples and data
3. Technical details and explanations
4. Expert opinions and insights
5. Unique perspectives and approaches
6. Real-world applications
7. Case studies and demonstrations

Format as a detailed analysis that maintains all specific information."#;

/// Combines per-reference analyses. Replace `{topic}` and `{analyses}` before sending.
pub const REFERENCE_COMBINATION_PROMPT: &str = r#"Combine and structure these analyzed contents into a comprehensive reference for the topic "{topic}":

{analyses}

Create a unified knowledge base that:
1. Preserves all specific information from each source
2. Maintains technical accuracy and details
3. Retains expert insights and unique perspectives
4. Keeps all examples and case studies
5. Organizes information logically
6. Eliminates redundancy while keeping unique points
7. Relates directly to the main topic

Format as a detailed reference that can enhance the main topic discussion."#;

/// Separator between analyses in the combination prompt.
pub const ANALYSIS_SEPARATOR: &str = "\n\n---\n\n";

/// Header placed between caller context and integrated references.
pub const REFERENCES_HEADER: &str = "--- Additional References ---";
