use crate::feed::PostSummary;

/// Maximum number of post titles listed in the system prompt.
pub const PROMPT_POST_LIMIT: usize = 20;

const PERSONA: &str = "你是一个AI助手，专门帮助用户查询和了解这个技术博客的内容。

博客信息：
- 博客名称：JasmineRain's blog
- 博客主题：技术博客，涵盖算法、数据结构、编程语言、数据库、操作系统等

你的职责：
1. 帮助用户查找和介绍博客文章
2. 回答用户关于博客内容的问题
3. 根据博客文章内容提供技术建议和帮助
4. 解释博客中提到的技术概念和代码";

const CLOSING: &str = "请用友好、专业的语气回答用户的问题。如果用户询问博客文章，请提供文章标题和链接。";

/// Build the system prompt from the persona and the loaded posts.
///
/// `origin` is prefixed to a post's site-relative link to form its URL.
pub fn build_system_prompt(posts: &[PostSummary], origin: &str) -> String {
    let mut prompt = String::from(PERSONA);

    if !posts.is_empty() {
        prompt.push_str(&format!("\n\n当前博客有以下文章（{}篇）：\n", posts.len()));
        for (i, post) in posts.iter().take(PROMPT_POST_LIMIT).enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, post.title));
        }

        prompt.push_str("\n当用户询问博客文章时，你可以：\n");
        prompt.push_str("- 根据文章标题推荐相关文章\n");
        prompt.push_str("- 介绍文章内容\n");
        prompt.push_str("- 回答关于文章的问题\n");
        prompt.push_str(&format!("- 提供文章链接（格式：{}{{文章路径}}", origin));
        if let Some(example) = posts.iter().find(|p| !p.link.is_empty()) {
            prompt.push_str(&format!("，例如 {}{}", origin, example.link));
        }
        prompt.push('）');
    }

    prompt.push_str("\n\n");
    prompt.push_str(CLOSING);

    prompt
}
