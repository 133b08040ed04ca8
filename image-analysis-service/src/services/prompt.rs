/// Instruction sent after the image on every analysis request.
pub const PRODUCT_ANALYSIS_PROMPT: &str = r#"**Task:** Analyze the given image and identify multiple objects. For each detected object:

- Focus only on products; ignore people (e.g., human, man, woman, child).
- Extract the product's name, company, and a brief description (maximum 50 words).
- Identify two similar products based on available product details.

**Output Format:**
Return the data in a structured JSON format as shown below:

[
    {
        "name": "Product Name",
        "desc": "This product is used for ... and has use cases such as ...",
        "similar_products": ["Similar Product 1", "Similar Product 2"]
    },
    {
        "name": "Another Product Name",
        "desc": "This product is used for ... and has use cases such as ...",
        "similar_products": ["Similar Product A", "Similar Product B"]
    }
]

**Important Notes:**
1. Exclude "..." placeholders or incomplete entries in the similar_products field.
2. Ensure descriptions are concise and relevant.
"#;
