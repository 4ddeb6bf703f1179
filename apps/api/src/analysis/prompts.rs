// Prompt templates for each analysis type.
// Placeholders in `{braces}` are replaced by the builders in analysis/service.rs.

/// Persona prepended to the shared JSON-only system instruction.
pub const ANALYST_PERSONA: &str =
    "You are an expert HR analyst, career coach and technical recruiter.";

/// Skill gap prompt. Replace `{resume_text}` and `{job_description}`.
pub const SKILL_GAP_PROMPT_TEMPLATE: &str = r#"Analyze the following resume and job description to identify skill gaps.

RESUME:
{resume_text}

JOB DESCRIPTION:
{job_description}

Return a JSON object with this EXACT schema:
{
  "jobTitle": "extracted job title from the job description",
  "matchedSkills": ["skill1", "skill2"],
  "missingSkills": ["skill1", "skill2"],
  "extraSkills": ["skill1", "skill2"],
  "matchScore": 75,
  "learningRoadmap": [
    {
      "skill": "skill name",
      "level": "Beginner|Intermediate|Advanced",
      "estimatedDays": 14,
      "resourceUrl": "https://free-learning-resource.example",
      "resourceName": "Resource Name"
    }
  ]
}

Rules:
1. matchedSkills: skills present in BOTH the resume and the job description
2. missingSkills: skills required by the job description but NOT found in the resume
3. extraSkills: skills in the resume that the job description does not ask for
4. matchScore: 0-100, how well the resume matches the job description
5. learningRoadmap: one entry for EACH missing skill, with a free learning resource

Be specific with skill names."#;

/// Resume rewrite prompt. Replace `{resume_text}` and `{job_description}`.
pub const REWRITE_PROMPT_TEMPLATE: &str = r#"Rewrite the following resume so it is optimized for the target job description and passes applicant tracking systems.

ORIGINAL RESUME:
{resume_text}

TARGET JOB DESCRIPTION:
{job_description}

Rules:
1. Highlight qualifications that match the job description
2. Start bullets with strong action verbs (Led, Developed, Implemented, Optimized)
3. Work keywords from the job description in naturally
4. Quantify achievements where the original resume supports it
5. Plain formatting only: no tables or graphics

Return a JSON object with this EXACT schema:
{
  "summary": "2-3 sentence professional summary tailored to this role",
  "skills": ["skill1", "skill2"],
  "experience": [
    {
      "title": "Job Title",
      "company": "Company Name",
      "duration": "Start - End",
      "bullets": ["Action verb + achievement + impact"]
    }
  ],
  "projects": [
    {"name": "Project Name", "description": "What it does, technologies, impact"}
  ],
  "education": [
    {"degree": "Degree Name", "institution": "Institution Name", "year": "Year"}
  ],
  "keywords": ["keyword1", "keyword2"]
}

"keywords" holds the 10 most important ATS keywords from the job description that the rewrite now contains."#;

/// Project suggestion prompt. Replace `{skills}` and `{job_title}`.
pub const PROJECT_PROMPT_TEMPLATE: &str = r#"Suggest 3-5 practical mini-projects that teach the following skills to someone targeting a {job_title} role.

SKILLS TO LEARN:
{skills}

Each project must be portfolio-worthy and achievable in 1-4 weeks.

Return a JSON object with this EXACT schema:
{
  "projects": [
    {
      "title": "Project Title",
      "description": "2-3 sentences on what the project does",
      "techStack": ["Technology1", "Technology2"],
      "learningOutcomes": ["Outcome 1", "Outcome 2"],
      "difficulty": "Beginner|Intermediate|Advanced",
      "estimatedDays": 7
    }
  ]
}

Include a mix of difficulties. The tech stack must cover the skills to learn."#;

/// Role suggestion prompt. Replace `{resume_text}`, `{skills}` and `{job_title}`.
pub const ROLE_PROMPT_TEMPLATE: &str = r#"Based on the following resume, suggest 3-5 alternative job roles this person is a strong fit for.

RESUME:
{resume_text}

CURRENT SKILLS IDENTIFIED:
{skills}

ROLE THEY APPLIED FOR:
{job_title}

Return a JSON object with this EXACT schema:
{
  "roles": [
    {
      "roleName": "Job Title",
      "matchPercentage": 85,
      "fitRationale": "2-3 sentences on why their experience fits",
      "skillsToAdd": ["Skill1", "Skill2"]
    }
  ]
}

matchPercentage is 0-100. skillsToAdd lists 2-4 skills that would make them more competitive. Order roles by matchPercentage, highest first."#;

/// GitHub profile prompt. Replace `{profile}` and `{target_role}`.
pub const GITHUB_PROMPT_TEMPLATE: &str = r#"Analyze this GitHub profile for someone targeting a {target_role} role.

GITHUB PROFILE:
{profile}

Return a JSON object with this EXACT schema:
{
  "overallScore": 75,
  "strengths": ["Strength based on their GitHub activity"],
  "gaps": ["Gap compared to the target role"],
  "projectSuggestions": [
    {"title": "Project to Build", "description": "Why it helps", "skills": ["Skill1"]}
  ],
  "repoImprovements": [
    {"repoName": "existing-repo-name", "suggestion": "How to improve it"}
  ],
  "actionItems": ["Specific action item"]
}

overallScore is 0-100: how well the profile demonstrates readiness for the target role. Reference their actual repositories and languages."#;
