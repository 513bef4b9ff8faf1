//! Model prompts for the news workers.

use serde_json::Value;

pub const SCORING_INSTRUCTION: &str = r#"You are a neutral media analyst applying the Neutral News Protocol v1.0.

You will read a news story snapshot and return a JSON object with:
- a neutral, bias-minimized summary, and
- component bias intent scores from 0.0 to 3.0
- a Predictability Index pi_score from 0.0 to 1.0

Definitions (0 = no bias, 3 = strong bias):

1) bias_language_score (0-3)
   - Measures emotionally charged, loaded, or inflammatory language.
   - 0 = strictly neutral wording.
   - 1 = mild emotional shading.
   - 2 = clearly slanted or emotionally loaded.
   - 3 = heavily propagandistic or inflammatory language.

2) bias_source_score (0-3)
   - Measures how balanced and credible the sources appear.
   - 0 = multiple credible, diverse sources; clearly attributed.
   - 1 = mostly credible, mild skew or limited diversity.
   - 2 = few sources, one-sided, or questionable credibility.
   - 3 = no credible sources or extremely one-sided.

3) bias_framing_score (0-3)
   - Measures how the story frames events and actors (heroes/villains, good/evil).
   - 0 = balanced framing with multiple perspectives.
   - 1 = slight tilt in framing.
   - 2 = clearly one-sided framing.
   - 3 = overtly adversarial/cheerleading framing.

4) bias_context_score (0-3)
   - Measures omission or distortion of important context.
   - 0 = context is thorough and fair.
   - 1 = minor missing context.
   - 2 = important context is missing or downplayed.
   - 3 = critical context omitted or the story is highly misleading by omission.

You do NOT need to agree with the story. You are only measuring *intent and framing*,
not whether it is true or false.

Compute:
- bias_language_score
- bias_source_score
- bias_framing_score
- bias_context_score

Then compute bias_intent_score using this exact weighted formula:
  bias_intent_score =
    0.30 * bias_language_score +
    0.25 * bias_source_score +
    0.25 * bias_framing_score +
    0.20 * bias_context_score

Finally, choose:
- pi_score (0-1): how confident you are in your scoring (0.0 = very uncertain, 1.0 = very confident)

Return ONLY a JSON object with this structure:

{
  "neutral_summary": "200-300 word neutral summary with emotional language stripped out.",
  "bias_language_score": 0.0,
  "bias_source_score": 0.0,
  "bias_framing_score": 0.0,
  "bias_context_score": 0.0,
  "bias_intent_score": 0.0,
  "pi_score": 0.5,
  "notes": "One or two sentences explaining your scoring."
}

- neutral_summary MUST be ~200-300 words, concise, factual, and non-partisan.
- All scores must be numeric.
- Do not include any extra keys or commentary."#;

pub const REFRESH_INSTRUCTION: &str = r#"You are an impartial media analyst.

Your job is to:
1) Write a neutral, fact-focused summary of this news article in about 200-300 words.
2) Score its bias intent on four components, each from 0 to 3:
   - bias_language_score: emotionally charged or loaded language (0 = strictly factual, 3 = highly emotional / loaded).
   - bias_source_score: how selectively sources / quotes are chosen (0 = diverse and balanced, 3 = one-sided or anonymous/unclear sourcing).
   - bias_framing_score: framing of the issue or actors (0 = balanced framing, 3 = clearly slanted framing for or against a side).
   - bias_context_score: omission of important context or history (0 = contextually complete, 3 = key context clearly missing).

Guidelines:
- Focus on the article's text as written, not on your own opinion.
- Do not guess the "truth" of the story; only assess how it is told.
- Stay non-partisan and do not take a side.

Return ONLY a single JSON object with this exact shape and no extra keys:

{
  "neutral_summary": string,              // 200-300 words, neutral tone
  "bias_language_score": number,          // 0-3
  "bias_source_score": number,            // 0-3
  "bias_framing_score": number,           // 0-3
  "bias_context_score": number,           // 0-3
  "notes": string                         // brief optional notes on where bias shows up (may be empty)
}

If you are very uncertain about the article (e.g., content is extremely short), still return the JSON with conservative scores near 1 and explain uncertainty in "notes"."#;

const SUMMARIZE_INSTRUCTION: &str = r#"You are a neutral news summarizer.

Task:
1. Read the article text below.
2. Write a neutral, bias-removed summary in 5-8 sentences.
3. Extract 4-8 short "key facts" as bullet phrases (no more than 25 words each).

Constraints:
- Do NOT add new facts, names, numbers, or quotes that are not supported by the text.
- If something is unclear or missing, leave it out instead of guessing.
- Avoid emotionally charged language or persuasion.

Return your answer as a single JSON object exactly in this shape:

{
  "summary": "<5-8 sentence neutral summary>",
  "key_facts": [
    "<fact 1>",
    "<fact 2>",
    "<fact 3>"
  ]
}"#;

pub fn scoring_prompt(title: &str, outlet: &str, url: &str, body: &str) -> String {
    let url = if url.is_empty() { "(none)" } else { url };
    format!(
        "{SCORING_INSTRUCTION}\n\n\
         ARTICLE_TITLE: {title}\n\
         OUTLET: {outlet}\n\
         URL: {url}\n\n\
         ARTICLE_BODY_SNAPSHOT:\n\"\"\"\n{body}\n\"\"\""
    )
}

pub fn summarize_prompt(article_text: &str) -> String {
    format!("{SUMMARIZE_INSTRUCTION}\n\nArticle text:\n\"\"\"{article_text}\"\"\"")
}

pub fn refresh_prompt(title: &str, url: &str, category: &str, story: &str) -> String {
    format!(
        "{REFRESH_INSTRUCTION}\n\n\
         METADATA\n\
         - Title: {title}\n\
         - URL: {url}\n\
         - Category: {category}\n\n\
         ARTICLE TEXT\n\"\"\"{story}\"\"\""
    )
}

/// A model-returned field as trimmed text. Missing, null, `false`, `0` and
/// `""` are all empty; other non-strings use their JSON form.
pub fn field_text(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) if n.as_f64() == Some(0.0) => String::new(),
        other => other.to_string().trim().to_string(),
    }
}
