//! Message catalog for English, Russian and Uzbek

use super::{Lang, MenuButton, TextKey};

fn pick(lang: Lang, en: &'static str, ru: &'static str, uz: &'static str) -> &'static str {
    match lang {
        Lang::En => en,
        Lang::Ru => ru,
        Lang::Uz => uz,
    }
}

#[allow(clippy::too_many_lines)]
pub(super) fn text(lang: Lang, key: TextKey) -> &'static str {
    use TextKey as K;
    match key {
        K::TemporaryFailure => pick(
            lang,
            "Something went wrong. Please try again with /start.",
            "Что-то пошло не так. Попробуйте снова через /start.",
            "Xatolik yuz berdi. /start orqali qaytadan urinib ko'ring.",
        ),
        K::PermissionDenied => pick(
            lang,
            "You do not have access to this section.",
            "У вас нет доступа к этому разделу.",
            "Sizda bu bo'limga ruxsat yo'q.",
        ),
        K::UnknownAction => pick(lang, "Unknown action.", "Неизвестное действие.", "Noma'lum amal."),
        K::NothingToConfirm => pick(
            lang,
            "This action is no longer active.",
            "Это действие уже неактуально.",
            "Bu amal endi faol emas.",
        ),
        K::Cancelled => pick(lang, "Cancelled.", "Отменено.", "Bekor qilindi."),
        K::UseButtons => pick(
            lang,
            "Please use the buttons below.",
            "Пожалуйста, воспользуйтесь кнопками ниже.",
            "Iltimos, quyidagi tugmalardan foydalaning.",
        ),
        K::ChooseMenuItem => pick(lang, "Choose a menu item.", "Выберите пункт меню.", "Menyudan tanlang."),
        K::HelpGuest => pick(
            lang,
            "Send /start to register as a parent.",
            "Отправьте /start, чтобы зарегистрироваться как родитель.",
            "Ota-ona sifatida ro'yxatdan o'tish uchun /start yuboring.",
        ),
        K::HelpParent => pick(
            lang,
            "Use the menu to send complaints or proposals, see the timetable, grades and announcements. /cancel stops the current action.",
            "Через меню можно отправить жалобу или предложение, посмотреть расписание, оценки и объявления. /cancel прерывает текущее действие.",
            "Menyu orqali shikoyat yoki taklif yuborish, dars jadvali, baholar va e'lonlarni ko'rish mumkin. /cancel joriy amalni to'xtatadi.",
        ),
        K::HelpTeacher => pick(
            lang,
            "Use the menu to mark attendance and grade students. /cancel stops the current action.",
            "Через меню можно отметить посещаемость и выставить оценки. /cancel прерывает текущее действие.",
            "Menyu orqali davomatni belgilash va baho qo'yish mumkin. /cancel joriy amalni to'xtatadi.",
        ),
        K::HelpAdmin => pick(
            lang,
            "Open the admin panel to manage classes, teachers, timetables and announcements.",
            "Откройте панель администратора, чтобы управлять классами, учителями, расписанием и объявлениями.",
            "Sinflar, o'qituvchilar, jadval va e'lonlarni boshqarish uchun admin panelini oching.",
        ),
        K::GreetingParent => pick(
            lang,
            "Welcome back, {name}!",
            "С возвращением, {name}!",
            "Xush kelibsiz, {name}!",
        ),
        K::GreetingTeacher => pick(
            lang,
            "Hello, {name}! Choose what you want to do.",
            "Здравствуйте, {name}! Выберите действие.",
            "Assalomu alaykum, {name}! Amalni tanlang.",
        ),
        K::GreetingAdmin => pick(
            lang,
            "Hello, administrator!",
            "Здравствуйте, администратор!",
            "Assalomu alaykum, administrator!",
        ),
        K::ConfirmButton => pick(lang, "✅ Confirm", "✅ Подтвердить", "✅ Tasdiqlash"),
        K::CancelButton => pick(lang, "❌ Cancel", "❌ Отмена", "❌ Bekor qilish"),
        K::DoneButton => pick(lang, "✔️ Done", "✔️ Готово", "✔️ Tayyor"),
        K::SubmitButton => pick(lang, "📨 Submit", "📨 Отправить", "📨 Yuborish"),
        K::TextExpected => pick(
            lang,
            "Please send a text message.",
            "Пожалуйста, отправьте текстовое сообщение.",
            "Iltimos, matnli xabar yuboring.",
        ),

        K::ChooseLanguage => pick(
            lang,
            "Please choose a language:",
            "Пожалуйста, выберите язык:",
            "Iltimos, tilni tanlang:",
        ),
        K::LanguageSaved => pick(lang, "Language saved.", "Язык сохранён.", "Til saqlandi."),
        K::AskPhone => pick(
            lang,
            "Share your phone number using the button below.",
            "Поделитесь номером телефона с помощью кнопки ниже.",
            "Quyidagi tugma orqali telefon raqamingizni yuboring.",
        ),
        K::SharePhoneButton => pick(lang, "📱 Share phone number", "📱 Отправить номер", "📱 Raqamni yuborish"),
        K::InvalidPhone => pick(
            lang,
            "That does not look like a phone number. Try again.",
            "Это не похоже на номер телефона. Попробуйте ещё раз.",
            "Bu telefon raqamiga o'xshamaydi. Qaytadan urinib ko'ring.",
        ),
        K::AskFullName => pick(
            lang,
            "Enter your full name.",
            "Введите ваше полное имя.",
            "To'liq ismingizni kiriting.",
        ),
        K::AskChildName => pick(
            lang,
            "Enter your child's full name.",
            "Введите полное имя ребёнка.",
            "Farzandingizning to'liq ismini kiriting.",
        ),
        K::ChooseChildClass => pick(
            lang,
            "Choose your child's class:",
            "Выберите класс ребёнка:",
            "Farzandingiz sinfini tanlang:",
        ),
        K::NoClassesYet => pick(
            lang,
            "No classes have been created yet.",
            "Классы ещё не созданы.",
            "Hali sinflar yaratilmagan.",
        ),
        K::ClassNotFound => pick(lang, "Class not found.", "Класс не найден.", "Sinf topilmadi."),
        K::RegistrationComplete => pick(
            lang,
            "Thank you, {name}! Registration is complete.",
            "Спасибо, {name}! Регистрация завершена.",
            "Rahmat, {name}! Ro'yxatdan o'tish yakunlandi.",
        ),

        K::AskComplaint => pick(
            lang,
            "Describe your complaint in one message.",
            "Опишите жалобу одним сообщением.",
            "Shikoyatingizni bitta xabarda yozing.",
        ),
        K::AskProposal => pick(
            lang,
            "Describe your proposal in one message.",
            "Опишите предложение одним сообщением.",
            "Taklifingizni bitta xabarda yozing.",
        ),
        K::ConfirmComplaint => pick(
            lang,
            "Your complaint:\n\n{text}\n\nSend it?",
            "Ваша жалоба:\n\n{text}\n\nОтправить?",
            "Shikoyatingiz:\n\n{text}\n\nYuborilsinmi?",
        ),
        K::ConfirmProposal => pick(
            lang,
            "Your proposal:\n\n{text}\n\nSend it?",
            "Ваше предложение:\n\n{text}\n\nОтправить?",
            "Taklifingiz:\n\n{text}\n\nYuborilsinmi?",
        ),
        K::ComplaintSent => pick(
            lang,
            "Your complaint has been sent. Thank you.",
            "Жалоба отправлена. Спасибо.",
            "Shikoyatingiz yuborildi. Rahmat.",
        ),
        K::ProposalSent => pick(
            lang,
            "Your proposal has been sent. Thank you.",
            "Предложение отправлено. Спасибо.",
            "Taklifingiz yuborildi. Rahmat.",
        ),
        K::FeedbackDiscarded => pick(lang, "Discarded.", "Отменено.", "Bekor qilindi."),
        K::NewComplaintNotice => pick(
            lang,
            "New complaint from {name}:\n\n{text}",
            "Новая жалоба от {name}:\n\n{text}",
            "{name}dan yangi shikoyat:\n\n{text}",
        ),
        K::NewProposalNotice => pick(
            lang,
            "New proposal from {name}:\n\n{text}",
            "Новое предложение от {name}:\n\n{text}",
            "{name}dan yangi taklif:\n\n{text}",
        ),
        K::NoFeedback => pick(lang, "Nothing here yet.", "Пока ничего нет.", "Hozircha hech narsa yo'q."),
        K::RecentComplaints => pick(lang, "Recent complaints:", "Последние жалобы:", "So'nggi shikoyatlar:"),
        K::RecentProposals => pick(lang, "Recent proposals:", "Последние предложения:", "So'nggi takliflar:"),

        K::AdminPanelTitle => pick(lang, "Admin panel", "Панель администратора", "Admin paneli"),
        K::AdminClassesButton => pick(lang, "🏫 Classes", "🏫 Классы", "🏫 Sinflar"),
        K::AdminAddClassButton => pick(lang, "➕ Add class", "➕ Добавить класс", "➕ Sinf qo'shish"),
        K::AdminAddTeacherButton => pick(lang, "👩‍🏫 Add teacher", "👩‍🏫 Добавить учителя", "👩‍🏫 O'qituvchi qo'shish"),
        K::AdminTimetableButton => pick(lang, "🗓 Upload timetable", "🗓 Загрузить расписание", "🗓 Jadval yuklash"),
        K::AdminAnnounceButton => pick(lang, "📢 New announcement", "📢 Новое объявление", "📢 Yangi e'lon"),
        K::AdminComplaintsButton => pick(lang, "📥 Complaints", "📥 Жалобы", "📥 Shikoyatlar"),
        K::AdminProposalsButton => pick(lang, "💡 Proposals", "💡 Предложения", "💡 Takliflar"),
        K::ClassList => pick(
            lang,
            "Classes (tap to delete):",
            "Классы (нажмите, чтобы удалить):",
            "Sinflar (o'chirish uchun bosing):",
        ),
        K::AskClassName => pick(lang, "Enter the class name.", "Введите название класса.", "Sinf nomini kiriting."),
        K::ClassCreated => pick(lang, "Class {class} created.", "Класс {class} создан.", "{class} sinfi yaratildi."),
        K::ClassExists => pick(
            lang,
            "Class {class} already exists. Enter another name.",
            "Класс {class} уже существует. Введите другое название.",
            "{class} sinfi allaqachon mavjud. Boshqa nom kiriting.",
        ),
        K::ClassDeleted => pick(lang, "Class deleted.", "Класс удалён.", "Sinf o'chirildi."),
        K::AskTeacherPhone => pick(
            lang,
            "Enter the teacher's phone number.",
            "Введите номер телефона учителя.",
            "O'qituvchining telefon raqamini kiriting.",
        ),
        K::AskTeacherName => pick(
            lang,
            "Enter the teacher's full name.",
            "Введите полное имя учителя.",
            "O'qituvchining to'liq ismini kiriting.",
        ),
        K::ChooseTeacherClasses => pick(
            lang,
            "Select the teacher's classes, then press Done.",
            "Выберите классы учителя и нажмите «Готово».",
            "O'qituvchi sinflarini tanlang va «Tayyor»ni bosing.",
        ),
        K::TeacherCreated => pick(
            lang,
            "{name} added. They get access after sharing their phone number with the bot.",
            "{name} добавлен(а). Доступ появится после того, как учитель отправит боту свой номер.",
            "{name} qo'shildi. O'qituvchi botga raqamini yuborgach, kirish huquqi paydo bo'ladi.",
        ),
        K::TeacherExists => pick(
            lang,
            "A teacher with this phone number already exists.",
            "Учитель с таким номером уже существует.",
            "Bu raqamli o'qituvchi allaqachon mavjud.",
        ),

        K::ChooseTimetableClass => pick(
            lang,
            "Choose the class for the timetable:",
            "Выберите класс для расписания:",
            "Jadval uchun sinfni tanlang:",
        ),
        K::AskTimetableFile => pick(
            lang,
            "Send the timetable as a photo or a document.",
            "Отправьте расписание фотографией или документом.",
            "Jadvalni rasm yoki hujjat sifatida yuboring.",
        ),
        K::TimetableSaved => pick(lang, "Timetable saved.", "Расписание сохранено.", "Jadval saqlandi."),
        K::TimetableMissing => pick(
            lang,
            "The timetable has not been uploaded yet.",
            "Расписание ещё не загружено.",
            "Jadval hali yuklanmagan.",
        ),
        K::TimetableUpdatedNotice => pick(
            lang,
            "The timetable for {class} has been updated. Open the menu to see it.",
            "Расписание для {class} обновлено. Откройте меню, чтобы посмотреть.",
            "{class} sinfi jadvali yangilandi. Ko'rish uchun menyuni oching.",
        ),

        K::AskAnnouncement => pick(
            lang,
            "Send the announcement text.",
            "Отправьте текст объявления.",
            "E'lon matnini yuboring.",
        ),
        K::ConfirmAnnouncement => pick(
            lang,
            "Announcement:\n\n{text}\n\nSend to all parents?",
            "Объявление:\n\n{text}\n\nОтправить всем родителям?",
            "E'lon:\n\n{text}\n\nBarcha ota-onalarga yuborilsinmi?",
        ),
        K::AnnouncementSent => pick(
            lang,
            "The announcement is being delivered to {count} parents.",
            "Объявление рассылается {count} родителям.",
            "E'lon {count} ota-onaga yuborilmoqda.",
        ),
        K::AnnouncementNotice => pick(lang, "📢 {text}", "📢 {text}", "📢 {text}"),
        K::NoAnnouncements => pick(lang, "No announcements yet.", "Объявлений пока нет.", "Hozircha e'lonlar yo'q."),
        K::RecentAnnouncements => pick(lang, "Recent announcements:", "Последние объявления:", "So'nggi e'lonlar:"),

        K::ChooseAttendanceClass => pick(
            lang,
            "Choose a class to mark attendance:",
            "Выберите класс для отметки посещаемости:",
            "Davomat uchun sinfni tanlang:",
        ),
        K::MarkAbsentees => pick(
            lang,
            "Tap the students who are absent, then press Submit.",
            "Отметьте отсутствующих учеников и нажмите «Отправить».",
            "Kelmagan o'quvchilarni belgilang va «Yuborish»ni bosing.",
        ),
        K::AttendanceSaved => pick(
            lang,
            "Attendance saved: {absent} absent of {total}.",
            "Посещаемость сохранена: отсутствуют {absent} из {total}.",
            "Davomat saqlandi: {total} tadan {absent} ta kelmagan.",
        ),
        K::AbsenceNotice => pick(
            lang,
            "{child} was marked absent on {date}.",
            "{child} отмечен(а) отсутствующим(ей) {date}.",
            "{child} {date} kuni darsga kelmagan deb belgilandi.",
        ),
        K::NoAbsences => pick(lang, "No absences recorded.", "Пропусков нет.", "Qoldirilgan darslar yo'q."),
        K::AbsenceList => pick(lang, "Absences of {child}:", "Пропуски: {child}", "{child}ning qoldirgan kunlari:"),

        K::ChooseGradeClass => pick(
            lang,
            "Choose a class to grade:",
            "Выберите класс для оценок:",
            "Baholash uchun sinfni tanlang:",
        ),
        K::ChooseStudent => pick(lang, "Choose a student:", "Выберите ученика:", "O'quvchini tanlang:"),
        K::AskGrade => pick(
            lang,
            "Enter a grade for {student} (1-5).",
            "Введите оценку для {student} (1-5).",
            "{student} uchun bahoni kiriting (1-5).",
        ),
        K::InvalidGrade => pick(
            lang,
            "A grade must be a number from 1 to 5.",
            "Оценка должна быть числом от 1 до 5.",
            "Baho 1 dan 5 gacha bo'lgan son bo'lishi kerak.",
        ),
        K::GradeSaved => pick(
            lang,
            "Saved: {student} received {grade}.",
            "Сохранено: {student} получил(а) {grade}.",
            "Saqlandi: {student} {grade} oldi.",
        ),
        K::GradeNotice => pick(
            lang,
            "{child} received a new grade: {grade}.",
            "{child} получил(а) новую оценку: {grade}.",
            "{child} yangi baho oldi: {grade}.",
        ),
        K::NoGrades => pick(lang, "No grades yet.", "Оценок пока нет.", "Hozircha baholar yo'q."),
        K::GradeList => pick(lang, "Grades of {child}:", "Оценки: {child}", "{child}ning baholari:"),
        K::NoStudents => pick(
            lang,
            "There are no students in this class.",
            "В этом классе нет учеников.",
            "Bu sinfda o'quvchilar yo'q.",
        ),
        K::NoTeacherClasses => pick(
            lang,
            "You have no classes assigned.",
            "За вами не закреплены классы.",
            "Sizga sinflar biriktirilmagan.",
        ),
    }
}

pub(super) fn button(lang: Lang, button: MenuButton) -> &'static str {
    use MenuButton as B;
    match button {
        B::AdminPanel => pick(lang, "⚙️ Admin panel", "⚙️ Админ-панель", "⚙️ Admin panel"),
        B::MainMenu => pick(lang, "🏠 Main menu", "🏠 Главное меню", "🏠 Bosh menyu"),
        B::Complaint => pick(lang, "📝 Complaint", "📝 Жалоба", "📝 Shikoyat"),
        B::Proposal => pick(lang, "💡 Proposal", "💡 Предложение", "💡 Taklif"),
        B::Timetable => pick(lang, "🗓 Timetable", "🗓 Расписание", "🗓 Dars jadvali"),
        B::Announcements => pick(lang, "📢 Announcements", "📢 Объявления", "📢 E'lonlar"),
        B::Grades => pick(lang, "📊 Grades", "📊 Оценки", "📊 Baholar"),
        B::Attendance => pick(lang, "📅 Attendance", "📅 Посещаемость", "📅 Davomat"),
        B::Language => pick(lang, "🌐 Language", "🌐 Язык", "🌐 Til"),
        B::MarkAttendance => pick(lang, "✅ Mark attendance", "✅ Отметить посещаемость", "✅ Davomatni belgilash"),
        B::GradeStudents => pick(lang, "🖊 Grade students", "🖊 Выставить оценки", "🖊 Baho qo'yish"),
    }
}
