//! Prompt template for the concept mapping model.
//!
//! Written for instruction-tuned Mistral models, hence the `[INST]` wrapper.

pub fn build_mapping_prompt(term: &str) -> String {
    format!(
        r#"[INST] You are an expert medical terminology mapper specializing in OMOP Common Data Model.

Your task: Map the clinical term '{term}' to its most appropriate OMOP concept.

Instructions:
- Analyze the term '{term}' carefully
- Find the best matching OMOP concept ID (8-digit number)
- Determine the correct vocabulary (SNOMED, ICD10CM, LOINC, etc.)
- Provide the official concept name
- Explain your reasoning

Output format (JSON only):
{{"CONCEPT_ID": "concept_id_here", "CODE": "vocabulary_here", "NAME": "concept_name_here", "REASON": "explanation_here"}}

Now map: {term}[/INST]"#,
        term = term
    )
}
