// Minimal inline pages for the browser flows. No template engine; these
// are small enough to format directly.

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title} - Student Q&amp;A Chatbot</title>\n</head>\n<body>\n\
         <h1>{title}</h1>\n{body}\n</body>\n</html>\n"
    )
}

fn error_banner(error: Option<&str>) -> String {
    match error {
        Some(message) => format!("<p class=\"error\">{}</p>\n", escape(message)),
        None => String::new(),
    }
}

pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn index_page(first_name: &str) -> String {
    let body = format!(
        "<p>Hello, {}! Ask a question about the course below.</p>\n\
         <form id=\"chat\">\n\
         <textarea name=\"question\" rows=\"4\" cols=\"60\"></textarea><br>\n\
         <button type=\"submit\">Ask</button>\n\
         </form>\n\
         <div id=\"answer\"></div>\n\
         <p><a href=\"/history\">History</a> | <a href=\"/logout\">Logout</a></p>\n\
         <script>\n\
         document.getElementById('chat').addEventListener('submit', async (e) => {{\n\
           e.preventDefault();\n\
           const question = e.target.question.value;\n\
           const res = await fetch('/ask', {{method: 'POST', headers: {{'Content-Type': 'application/json'}}, body: JSON.stringify({{question}})}});\n\
           const data = await res.json();\n\
           document.getElementById('answer').textContent = data.answer || data.error;\n\
         }});\n\
         </script>",
        escape(first_name)
    );
    layout("Chat", &body)
}

pub fn login_page(error: Option<&str>) -> String {
    let body = format!(
        "{}<form method=\"post\" action=\"/login\">\n\
         <label>Email <input type=\"email\" name=\"email\" required></label><br>\n\
         <label>Password <input type=\"password\" name=\"password\" required></label><br>\n\
         <button type=\"submit\">Log in</button>\n\
         </form>\n\
         <p><a href=\"/register\">Register</a> | <a href=\"/user_form\">Continue as guest</a></p>",
        error_banner(error)
    );
    layout("Login", &body)
}

pub fn register_page(error: Option<&str>) -> String {
    let body = format!(
        "{}<form method=\"post\" action=\"/register\">\n\
         <label>First name <input name=\"firstName\" required></label><br>\n\
         <label>Last name <input name=\"lastName\" required></label><br>\n\
         <label>Student ID <input name=\"studentId\" required></label><br>\n\
         <label>Email <input type=\"email\" name=\"email\" required></label><br>\n\
         <label>Password <input type=\"password\" name=\"password\" required></label><br>\n\
         <label>Confirm password <input type=\"password\" name=\"confirmPassword\" required></label><br>\n\
         <label>Course section <input name=\"courseSection\"></label><br>\n\
         <label>Semester <input name=\"semester\"></label><br>\n\
         <button type=\"submit\">Register</button>\n\
         </form>\n\
         <p><a href=\"/login\">Back to login</a></p>",
        error_banner(error)
    );
    layout("Register", &body)
}

pub fn user_form_page() -> String {
    let body = "<p>Tell us who you are before asking questions.</p>\n\
         <form method=\"post\" action=\"/submit_user_info\">\n\
         <label>First name <input name=\"firstName\" required></label><br>\n\
         <label>Last name <input name=\"lastName\" required></label><br>\n\
         <label>Student ID <input name=\"studentId\" required></label><br>\n\
         <label>Email <input type=\"email\" name=\"email\" required></label><br>\n\
         <label>Course section <input name=\"courseSection\"></label><br>\n\
         <label>Semester <input name=\"semester\"></label><br>\n\
         <button type=\"submit\">Start chatting</button>\n\
         </form>"
        .to_string();
    layout("Guest Information", &body)
}

pub fn admin_login_page(error: Option<&str>) -> String {
    let body = format!(
        "{}<form method=\"post\" action=\"/admin/login\">\n\
         <label>Email <input type=\"email\" name=\"email\" required></label><br>\n\
         <label>Password <input type=\"password\" name=\"password\" required></label><br>\n\
         <button type=\"submit\">Log in</button>\n\
         </form>",
        error_banner(error)
    );
    layout("Admin Login", &body)
}
